//! Server-side exchange of an authorization code for an access token.

use {
    reqwest::StatusCode,
    secrecy::{ExposeSecret, Secret},
    tracing::debug,
    url::Url,
};

use crate::{
    error::{Error, Result},
    types::AccessToken,
};

/// Exchanges authorization codes for one client and redirect URI.
pub struct CodeExchanger {
    client: reqwest::Client,
    token_url: Url,
    client_id: String,
    client_secret: Secret<String>,
    redirect_uri: String,
}

impl CodeExchanger {
    pub fn new(
        client: reqwest::Client,
        token_url: &str,
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        redirect_uri: impl Into<String>,
    ) -> Result<Self> {
        Ok(Self {
            client,
            token_url: Url::parse(token_url)?,
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
        })
    }

    /// Trade `code` for an access token.
    ///
    /// Any status other than 200 is a failure, whatever the body says.
    pub async fn exchange(&self, code: &str) -> Result<AccessToken> {
        let mut url = self.token_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("client_secret", self.client_secret.expose_secret())
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("code", code)
            .append_pair("grant_type", "authorization_code");

        debug!(token_url = %self.token_url, "exchanging authorization code");

        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::Exchange(e.without_url().to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| {
                Error::Exchange(format!("failed to read response: {}", e.without_url()))
            })?;

        if status != StatusCode::OK {
            return Err(Error::Exchange(format!("{status}: {}", body.trim())));
        }

        parse_token_response(&body)
            .map(AccessToken::new)
            .ok_or_else(|| Error::Exchange("response did not contain an access token".into()))
    }
}

/// Extract `access_token` from a token endpoint body.
///
/// Accepts a JSON object or a form-encoded body such as `access_token=abc123`.
pub fn parse_token_response(body: &str) -> Option<String> {
    let body = body.trim();
    let token = if body.starts_with('{') {
        serde_json::from_str::<serde_json::Value>(body)
            .ok()?
            .get("access_token")?
            .as_str()?
            .to_string()
    } else {
        url::form_urlencoded::parse(body.as_bytes())
            .find(|(k, _)| k == "access_token")
            .map(|(_, v)| v.into_owned())?
    };
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use {super::*, mockito::Matcher};

    #[test]
    fn parses_plain_body() {
        assert_eq!(parse_token_response("access_token=abc123").as_deref(), Some("abc123"));
        assert_eq!(parse_token_response("access_token=abc123\n").as_deref(), Some("abc123"));
    }

    #[test]
    fn parses_extra_params_and_encoding() {
        assert_eq!(
            parse_token_response("token_type=bearer&access_token=a%2Bb%3D").as_deref(),
            Some("a+b=")
        );
    }

    #[test]
    fn parses_json_body() {
        assert_eq!(
            parse_token_response(r#"{"access_token":"abc123","token_type":"bearer"}"#).as_deref(),
            Some("abc123")
        );
    }

    #[test]
    fn error_body_yields_no_token() {
        assert_eq!(parse_token_response("error=invalid_grant"), None);
        assert_eq!(parse_token_response(r#"{"error":"invalid_grant"}"#), None);
        assert_eq!(parse_token_response("access_token="), None);
        assert_eq!(parse_token_response(""), None);
    }

    fn exchanger(server: &mockito::Server) -> CodeExchanger {
        CodeExchanger::new(
            reqwest::Client::new(),
            &format!("{}/oauth/access_token", server.url()),
            "cid",
            Secret::new("secret".into()),
            "http://127.0.0.1:18769/oauth_result",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn exchange_sends_all_parameters() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("client_id".into(), "cid".into()),
                Matcher::UrlEncoded("client_secret".into(), "secret".into()),
                Matcher::UrlEncoded(
                    "redirect_uri".into(),
                    "http://127.0.0.1:18769/oauth_result".into(),
                ),
                Matcher::UrlEncoded("code".into(), "xyz".into()),
                Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            ]))
            .with_status(200)
            .with_body("access_token=abc123")
            .create_async()
            .await;

        let token = exchanger(&server).exchange("xyz").await.unwrap();
        assert_eq!(token.expose(), "abc123");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_200_is_a_failure_even_with_token_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body("access_token=looks_valid")
            .create_async()
            .await;

        let err = exchanger(&server).exchange("xyz").await.unwrap_err();
        assert!(matches!(err, Error::Exchange(msg) if msg.contains("400")));
    }

    #[tokio::test]
    async fn ok_status_without_token_is_a_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/oauth/access_token")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_body("error=invalid_grant")
            .create_async()
            .await;

        let err = exchanger(&server).exchange("xyz").await.unwrap_err();
        assert!(matches!(err, Error::Exchange(_)));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_a_failure() {
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let exchanger = CodeExchanger::new(
            reqwest::Client::new(),
            &format!("http://127.0.0.1:{port}/token"),
            "cid",
            Secret::new("secret".into()),
            "http://127.0.0.1:1/cb",
        )
        .unwrap();
        assert!(matches!(exchanger.exchange("x").await, Err(Error::Exchange(_))));
    }

    #[tokio::test]
    async fn transport_error_does_not_reveal_client_secret() {
        let port = {
            let l = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            l.local_addr().unwrap().port()
        };
        let exchanger = CodeExchanger::new(
            reqwest::Client::new(),
            &format!("http://127.0.0.1:{port}/token"),
            "cid",
            Secret::new("TOPSECRET".into()),
            "http://127.0.0.1:1/cb",
        )
        .unwrap();

        let err = exchanger.exchange("code").await.unwrap_err().to_string();
        assert!(err.starts_with("token exchange failed"), "{err}");
        assert!(!err.contains("TOPSECRET"), "{err}");
        assert!(!err.contains("client_secret"), "{err}");
    }

    #[test]
    fn invalid_token_url_is_rejected() {
        let result = CodeExchanger::new(
            reqwest::Client::new(),
            "not a url",
            "cid",
            Secret::new("s".into()),
            "http://127.0.0.1:1/cb",
        );
        assert!(matches!(result, Err(Error::Url(_))));
    }
}
