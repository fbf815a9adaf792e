use std::sync::{Mutex, PoisonError};

use {
    anyhow::Result,
    story_config::ConfigStore,
    tracing::debug,
};

use crate::types::{AccessToken, AuthSession, ClientIdentity};

/// Where a successful authorization is saved.
pub trait CredentialStore: Send + Sync {
    fn persist(&self, session: &AuthSession, token: &AccessToken) -> Result<()>;
}

/// Writes the session settings, client identity and token into the config file.
impl CredentialStore for ConfigStore {
    fn persist(&self, session: &AuthSession, token: &AccessToken) -> Result<()> {
        self.update(|cfg| {
            cfg.redirect_port = session.redirect_port;
            cfg.redirect_path = session.redirect_path.clone();
            cfg.flow = session.flow;
            cfg.client_id = session.client_identity.client_id.clone();
            cfg.client_secret = session.client_identity.client_secret.clone();
            cfg.access_token = Some(token.clone().into_secret());
        })?;
        debug!(path = %self.path().display(), "credentials saved");
        Ok(())
    }
}

/// In-memory store, handy for tests and dry runs.
#[derive(Default)]
pub struct MemoryCredentialStore {
    saved: Mutex<Vec<(ClientIdentity, AccessToken)>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `persist` calls.
    pub fn persist_count(&self) -> usize {
        self.saved.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// The most recently persisted identity and token.
    pub fn last(&self) -> Option<(ClientIdentity, AccessToken)> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn persist(&self, session: &AuthSession, token: &AccessToken) -> Result<()> {
        self.saved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((session.client_identity.clone(), token.clone()));
        Ok(())
    }
}
