use std::time::Duration;

/// Errors surfaced by the authorization flow.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to bind callback listener on 127.0.0.1:{port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("OAuth timeout: no callback received within {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("authorization succeeded but saving credentials failed: {0:#}")]
    Persist(anyhow::Error),

    #[error("invalid redirect path {0:?}")]
    InvalidRedirectPath(String),

    #[error("the authorization code flow requires a client secret")]
    MissingClientSecret,

    #[error("callback listener stopped before delivering a token")]
    ListenerClosed,

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}

impl Error {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
