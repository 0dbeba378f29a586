//! Credential provider seam.
//!
//! The store only needs "who is signed in right now" and "give me a bearer
//! token for them". [`SessionProvider`] is the in-process implementation used
//! by the binary; it persists the session as JSON next to the config.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};

/// Tokens this close to expiry are treated as expired
const EXPIRY_LEEWAY_MINUTES: i64 = 5;

/// The currently authenticated user
#[async_trait]
pub trait Principal: Send + Sync {
    fn uid(&self) -> &str;

    /// Produce a bearer token for the album API
    async fn get_token(&self) -> Result<String>;
}

/// Source of the current principal
pub trait CredentialProvider: Send + Sync {
    /// `None` when nobody is signed in
    fn current_principal(&self) -> Option<Arc<dyn Principal>>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub uid: String,
    pub id_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(uid: impl Into<String>, id_token: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            id_token: id_token.into(),
            expires_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at - Duration::minutes(EXPIRY_LEEWAY_MINUTES) < Utc::now(),
            None => false,
        }
    }
}

#[async_trait]
impl Principal for Session {
    fn uid(&self) -> &str {
        &self.uid
    }

    async fn get_token(&self) -> Result<String> {
        if self.id_token.is_empty() {
            return Err(anyhow!("Session for {} has no token", self.uid));
        }
        if self.is_expired() {
            return Err(anyhow!("Session token for {} has expired", self.uid));
        }
        Ok(self.id_token.clone())
    }
}

/// Holds at most one signed-in session, optionally persisted to disk
#[derive(Default)]
pub struct SessionProvider {
    session: RwLock<Option<Arc<Session>>>,
    path: Option<PathBuf>,
}

impl SessionProvider {
    /// Provider with no persistence
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider that saves sessions to `path`
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            session: RwLock::new(None),
            path: Some(path.into()),
        }
    }

    /// Restore a previously saved session, if any
    pub fn load_saved(&self) -> Result<Option<Session>> {
        let Some(path) = self.path.as_ref() else {
            return Ok(None);
        };
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read session file {}", path.display()))?;
        let session: Session = serde_json::from_str(&contents)
            .context("Failed to parse session file")?;

        self.set(Some(session.clone()))?;
        tracing::debug!("Restored session for {}", session.uid);
        Ok(Some(session))
    }

    pub fn sign_in(&self, session: Session) -> Result<()> {
        if let Some(path) = self.path.as_ref() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).context("Failed to create session directory")?;
            }
            let contents = serde_json::to_string_pretty(&session)?;
            fs::write(path, contents).context("Failed to write session file")?;
        }
        tracing::info!("Signed in as {}", session.uid);
        self.set(Some(session))
    }

    pub fn sign_out(&self) -> Result<()> {
        if let Some(path) = self.path.as_ref() {
            if path.exists() {
                fs::remove_file(path).context("Failed to remove session file")?;
            }
        }
        self.set(None)
    }

    fn set(&self, session: Option<Session>) -> Result<()> {
        let mut slot = self
            .session
            .write()
            .map_err(|e| anyhow!("lock poisoned: {e}"))?;
        *slot = session.map(Arc::new);
        Ok(())
    }
}

impl CredentialProvider for SessionProvider {
    fn current_principal(&self) -> Option<Arc<dyn Principal>> {
        let slot = match self.session.read() {
            Ok(slot) => slot,
            Err(poisoned) => poisoned.into_inner(),
        };
        slot.clone().map(|s| s as Arc<dyn Principal>)
    }
}
