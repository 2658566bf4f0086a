//! Minimal interactive shell over the session core: restore on start, then
//! a login/signup/status/logout loop. Contains no lifecycle decision logic
//! of its own.

use std::io::{self, Write};

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recipeshelf::api::IdentityClient;
use recipeshelf::auth::{AuthOrchestrator, AuthOutcome, CredentialStore};
use recipeshelf::config::Config;

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    init_tracing();
    info!("recipeshelf starting");

    let mut config = Config::load()?;
    let api_key = config.resolved_api_key()?;
    let provider = match config.identity_url.clone() {
        Some(url) => IdentityClient::with_base_url(url, api_key)?,
        None => IdentityClient::new(api_key)?,
    };
    let store = CredentialStore::new(Config::data_dir()?);
    let mut orchestrator = AuthOrchestrator::new(provider, store);

    if let AuthOutcome::Authenticated { .. } = orchestrator.restore() {
        if let Some(ref user) = orchestrator.state().user {
            println!("Welcome back, {}", user.email);
        }
    } else {
        println!("Not logged in. Type 'login' or 'signup' to begin.");
    }

    run_shell(&mut orchestrator, &mut config).await?;

    info!("recipeshelf shutting down");
    Ok(())
}

async fn run_shell(
    orchestrator: &mut AuthOrchestrator<IdentityClient>,
    config: &mut Config,
) -> Result<()> {
    loop {
        if let Some(AuthOutcome::Expired) = orchestrator.poll_expiry() {
            println!("Session expired, please log in again.");
        }

        print!("> ");
        io::stdout().flush()?;

        let Some(line) = read_line()? else {
            return Ok(());
        };

        match line.as_str() {
            "login" => attempt(orchestrator, config, false).await?,
            "signup" => attempt(orchestrator, config, true).await?,
            "status" => print_status(orchestrator),
            "logout" => {
                orchestrator.logout();
                println!("Logged out.");
            }
            "quit" | "exit" => return Ok(()),
            "" => {}
            other => println!("Unknown command '{other}'. Commands: login, signup, status, logout, quit"),
        }
    }
}

async fn attempt(
    orchestrator: &mut AuthOrchestrator<IdentityClient>,
    config: &mut Config,
    signup: bool,
) -> Result<()> {
    let email = prompt_email(config.last_email.as_deref())?;
    let password = rpassword::prompt_password("Password: ")?;

    let outcome = if signup {
        orchestrator.signup(&email, &password).await
    } else {
        orchestrator.login(&email, &password).await
    };

    match outcome {
        AuthOutcome::Authenticated { .. } => {
            config.last_email = Some(email);
            if let Err(e) = config.save() {
                tracing::warn!(error = %e, "Failed to save config");
            }
            println!("Login successful.");
        }
        _ => {
            if let Some(ref message) = orchestrator.state().auth_error {
                println!("{message}");
            }
            orchestrator.clear_error();
        }
    }
    Ok(())
}

/// Read one trimmed line from stdin; `None` on end of input.
fn read_line() -> Result<Option<String>> {
    let mut line = String::new();
    if io::stdin().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn prompt_email(last_email: Option<&str>) -> Result<String> {
    match last_email {
        Some(last) => print!("Email [{last}]: "),
        None => print!("Email: "),
    }
    io::stdout().flush()?;

    let mut email = String::new();
    io::stdin().read_line(&mut email)?;
    let email = email.trim();

    if email.is_empty() {
        if let Some(last) = last_email {
            return Ok(last.to_string());
        }
    }
    Ok(email.to_string())
}

fn print_status(orchestrator: &AuthOrchestrator<IdentityClient>) {
    match orchestrator.state().user {
        Some(ref user) if user.is_valid() => {
            let minutes = user.time_until_expiry().num_minutes().max(0);
            println!("Logged in as {} (token expires in {}m)", user.email, minutes);
        }
        _ => println!("Not logged in."),
    }
}
