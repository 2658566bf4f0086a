//! Durable credential persistence.
//!
//! Exactly one serialized session record lives on disk at a time. The wire
//! shape is fixed: `{email, id, _token, _tokenExpirationDate}` with the
//! expiration as an ISO-8601 instant, so a record written before a restart
//! restores bit-for-bit after it.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::Session;

/// Record file name in the data directory. The surrounding application keys
/// its storage by `userData`.
const CREDENTIAL_FILE: &str = "userData.json";

/// The durable form of a [`Session`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedCredential {
    pub email: String,
    pub id: String,
    #[serde(rename = "_token")]
    pub token: String,
    #[serde(rename = "_tokenExpirationDate")]
    pub token_expiration_date: DateTime<Utc>,
}

impl From<&Session> for PersistedCredential {
    fn from(session: &Session) -> Self {
        Self {
            email: session.email.clone(),
            id: session.user_id.clone(),
            token: session.token.clone(),
            token_expiration_date: session.expires_at,
        }
    }
}

impl From<PersistedCredential> for Session {
    fn from(record: PersistedCredential) -> Self {
        Self {
            email: record.email,
            user_id: record.id,
            token: record.token,
            expires_at: record.token_expiration_date,
        }
    }
}

/// File-backed store holding at most one credential record.
pub struct CredentialStore {
    data_dir: PathBuf,
}

impl CredentialStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Load the persisted record, if any.
    ///
    /// A missing, unreadable, or malformed record reads as "no session";
    /// restore must never fail hard on a bad file.
    pub fn load(&self) -> Option<PersistedCredential> {
        let path = self.credential_path();
        if !path.exists() {
            debug!("No persisted credential found");
            return None;
        }

        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "Failed to read persisted credential");
                return None;
            }
        };

        match serde_json::from_str(&contents) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(error = %e, "Failed to parse persisted credential");
                None
            }
        }
    }

    /// Write the record, replacing any previous one.
    pub fn save(&self, session: &Session) -> Result<()> {
        let record = PersistedCredential::from(session);
        let path = self.credential_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create credential store directory")?;
        }
        let contents = serde_json::to_string_pretty(&record)?;
        std::fs::write(&path, contents).context("Failed to write credential file")?;
        Ok(())
    }

    /// Remove the record entirely. No-op if none exists.
    pub fn clear(&self) -> Result<()> {
        let path = self.credential_path();
        if path.exists() {
            std::fs::remove_file(&path).context("Failed to remove credential file")?;
        }
        Ok(())
    }

    fn credential_path(&self) -> PathBuf {
        self.data_dir.join(CREDENTIAL_FILE)
    }
}

// ============================================================================
// Tests
// ============================================================================
