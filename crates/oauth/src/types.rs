use std::{fmt, time::Instant};

use {
    secrecy::{ExposeSecret, Secret},
    story_config::{FlowKind, StoryConfig},
};

use crate::error::{Error, Result};

/// Path the implicit-flow relay page redirects to.
pub const SUCCESS_PATH: &str = "success";

/// Registered OAuth application credentials.
#[derive(Debug, Clone)]
pub struct ClientIdentity {
    pub client_id: String,
    pub client_secret: Option<Secret<String>>,
}

impl ClientIdentity {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: None,
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.client_secret = Some(Secret::new(secret.into()));
        self
    }

    pub fn from_config(config: &StoryConfig) -> Self {
        Self {
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }

    /// The secret, ignoring an empty string.
    pub fn secret(&self) -> Option<&Secret<String>> {
        self.client_secret
            .as_ref()
            .filter(|s| !s.expose_secret().is_empty())
    }
}

/// An opaque access token. `Debug` never prints the value.
#[derive(Clone)]
pub struct AccessToken(Secret<String>);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(Secret::new(token.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn into_secret(self) -> Secret<String> {
        self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken([REDACTED])")
    }
}

/// One authorization attempt. Lives for a single `authorize` call.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub redirect_port: u16,
    pub redirect_path: String,
    pub client_identity: ClientIdentity,
    pub flow: FlowKind,
    pub started_at: Instant,
}

impl AuthSession {
    /// Validate the redirect settings and start a session.
    ///
    /// The path may be given with or without a leading `/`.
    pub fn new(
        client_identity: ClientIdentity,
        redirect_port: u16,
        redirect_path: &str,
        flow: FlowKind,
    ) -> Result<Self> {
        let path = normalize_redirect_path(redirect_path)?;
        if flow == FlowKind::Implicit && path == SUCCESS_PATH {
            return Err(Error::InvalidRedirectPath(redirect_path.to_string()));
        }
        if flow == FlowKind::Code && client_identity.secret().is_none() {
            return Err(Error::MissingClientSecret);
        }
        Ok(Self {
            redirect_port,
            redirect_path: path,
            client_identity,
            flow,
            started_at: Instant::now(),
        })
    }

    /// Build a session from the stored config.
    pub fn from_config(config: &StoryConfig) -> Result<Self> {
        Self::new(
            ClientIdentity::from_config(config),
            config.redirect_port,
            &config.redirect_path,
            config.flow,
        )
    }

    /// `http://127.0.0.1:{port}/{path}`
    pub fn redirect_uri(&self) -> String {
        format!(
            "http://127.0.0.1:{}/{}",
            self.redirect_port, self.redirect_path
        )
    }
}

/// Strip leading slashes and reject anything that is not a plain URL path.
pub(crate) fn normalize_redirect_path(path: &str) -> Result<String> {
    let trimmed = path.trim().trim_start_matches('/');
    let valid = !trimmed.is_empty()
        && !trimmed.ends_with('/')
        && !trimmed.contains("//")
        && trimmed
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
    if !valid {
        return Err(Error::InvalidRedirectPath(path.to_string()));
    }
    Ok(trimmed.to_string())
}
