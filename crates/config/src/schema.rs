/// Config schema: OAuth client identity, callback listener settings and the stored token.
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, Serializer},
};

/// Default loopback port for the OAuth redirect listener.
pub const DEFAULT_REDIRECT_PORT: u16 = 18769;

/// Default path component of the OAuth redirect URI.
pub const DEFAULT_REDIRECT_PATH: &str = "oauth_result";

/// Which OAuth variant this deployment uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowKind {
    /// Redirect carries a `code` that is exchanged server-side (needs a client secret).
    #[default]
    Code,
    /// Redirect carries the token in the URL fragment.
    Implicit,
}

impl FlowKind {
    /// Value of the `response_type` authorization parameter.
    pub fn response_type(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Implicit => "token",
        }
    }
}

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoryConfig {
    pub redirect_port: u16,
    pub redirect_path: String,
    pub flow: FlowKind,
    pub client_id: String,

    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub client_secret: Option<Secret<String>>,

    #[serde(
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub access_token: Option<Secret<String>>,
}

impl Default for StoryConfig {
    fn default() -> Self {
        Self {
            redirect_port: DEFAULT_REDIRECT_PORT,
            redirect_path: DEFAULT_REDIRECT_PATH.to_string(),
            flow: FlowKind::default(),
            client_id: String::new(),
            client_secret: None,
            access_token: None,
        }
    }
}

impl StoryConfig {
    /// The stored access token, if a previous authorization succeeded.
    pub fn access_token(&self) -> Option<&str> {
        self.access_token
            .as_ref()
            .map(|t| t.expose_secret().as_str())
            .filter(|t| !t.is_empty())
    }
}

/// Serialize an `Option<Secret<String>>` by exposing its value.
pub fn serialize_option_secret<S: Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let cfg = StoryConfig::default();
        assert_eq!(cfg.redirect_port, 18769);
        assert_eq!(cfg.redirect_path, "oauth_result");
        assert_eq!(cfg.flow, FlowKind::Code);
        assert!(cfg.access_token().is_none());
    }

    #[test]
    fn secrets_are_written_in_clear_but_hidden_from_debug() {
        let cfg = StoryConfig {
            client_id: "id".into(),
            client_secret: Some(Secret::new("shh".into())),
            access_token: Some(Secret::new("tok".into())),
            ..Default::default()
        };
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"client_secret\":\"shh\""));
        assert!(json.contains("\"access_token\":\"tok\""));
        assert!(!format!("{cfg:?}").contains("shh"));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: StoryConfig = toml::from_str("client_id = \"abc\"\nflow = \"implicit\"").unwrap();
        assert_eq!(cfg.client_id, "abc");
        assert_eq!(cfg.flow, FlowKind::Implicit);
        assert_eq!(cfg.redirect_port, DEFAULT_REDIRECT_PORT);
        assert!(cfg.client_secret.is_none());
    }

    #[test]
    fn empty_token_counts_as_missing() {
        let cfg = StoryConfig {
            access_token: Some(Secret::new(String::new())),
            ..Default::default()
        };
        assert!(cfg.access_token().is_none());
    }

    #[test]
    fn response_type_per_flow() {
        assert_eq!(FlowKind::Code.response_type(), "code");
        assert_eq!(FlowKind::Implicit.response_type(), "token");
    }
}
