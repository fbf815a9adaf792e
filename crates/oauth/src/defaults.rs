/// Authorization endpoint of the blog provider.
pub const DEFAULT_AUTHORIZE_URL: &str = "https://www.tistory.com/oauth/authorize";

/// Token exchange endpoint of the blog provider.
pub const DEFAULT_TOKEN_URL: &str = "https://www.tistory.com/oauth/access_token";

/// Provider OAuth endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub authorize_url: String,
    pub token_url: String,
}

impl Default for ProviderEndpoints {
    fn default() -> Self {
        Self {
            authorize_url: DEFAULT_AUTHORIZE_URL.into(),
            token_url: DEFAULT_TOKEN_URL.into(),
        }
    }
}

impl ProviderEndpoints {
    /// Built-in defaults, overridden by `STORY_OAUTH_AUTHORIZE_URL` and
    /// `STORY_OAUTH_TOKEN_URL` when set.
    pub fn from_env() -> Self {
        Self::with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut endpoints = Self::default();
        if let Some(v) = lookup("STORY_OAUTH_AUTHORIZE_URL").filter(|v| !v.is_empty()) {
            endpoints.authorize_url = v;
        }
        if let Some(v) = lookup("STORY_OAUTH_TOKEN_URL").filter(|v| !v.is_empty()) {
            endpoints.token_url = v;
        }
        endpoints
    }
}
