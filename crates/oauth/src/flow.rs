use std::time::Duration;

use {
    story_config::FlowKind,
    tracing::{debug, info, warn},
    url::Url,
};

use crate::{
    callback_server::{CallbackMode, CallbackServer},
    defaults::ProviderEndpoints,
    error::{Error, Result},
    exchange::CodeExchanger,
    launcher::UrlLauncher,
    storage::CredentialStore,
    types::{AccessToken, AuthSession},
};

/// How long the flow waits for the browser to come back.
pub const CALLBACK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlowState {
    ListenerStarted,
    BrowserLaunched,
    AwaitingCallback,
    Succeeded,
    TimedOut,
    Stopped,
}

/// Drives one browser-based authorization attempt.
pub struct OAuthFlow {
    session: AuthSession,
    endpoints: ProviderEndpoints,
    client: reqwest::Client,
}

impl OAuthFlow {
    pub fn new(session: AuthSession, endpoints: ProviderEndpoints) -> Self {
        Self {
            session,
            endpoints,
            client: reqwest::Client::new(),
        }
    }

    /// Use a specific HTTP client for the token exchange.
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn redirect_uri(&self) -> String {
        self.session.redirect_uri()
    }

    /// The provider URL the user is sent to.
    pub fn authorization_url(&self) -> Result<Url> {
        let mut url = Url::parse(&self.endpoints.authorize_url)?;
        url.query_pairs_mut()
            .append_pair("response_type", self.session.flow.response_type())
            .append_pair("client_id", &self.session.client_identity.client_id)
            .append_pair("redirect_uri", &self.redirect_uri());
        Ok(url)
    }

    fn callback_mode(&self) -> Result<CallbackMode> {
        match self.session.flow {
            FlowKind::Implicit => Ok(CallbackMode::Implicit),
            FlowKind::Code => {
                let secret = self
                    .session
                    .client_identity
                    .secret()
                    .ok_or(Error::MissingClientSecret)?;
                let exchanger = CodeExchanger::new(
                    self.client.clone(),
                    &self.endpoints.token_url,
                    self.session.client_identity.client_id.clone(),
                    secret.clone(),
                    self.redirect_uri(),
                )?;
                Ok(CallbackMode::Code(exchanger))
            },
        }
    }

    /// Run the flow: listen, open the browser, wait, persist.
    ///
    /// The listener is stopped before this returns, whatever the outcome.
    /// The store is written only when a token arrived in time.
    pub async fn authorize(
        &self,
        launcher: &dyn UrlLauncher,
        store: &dyn CredentialStore,
    ) -> Result<AccessToken> {
        let auth_url = self.authorization_url()?;
        let mode = self.callback_mode()?;

        let (mut listener, rx) = CallbackServer::start(
            self.session.redirect_port,
            &self.session.redirect_path,
            mode,
        )
        .await?;
        transition(FlowState::ListenerStarted);

        info!(url = %auth_url, "opening browser for authorization");
        if let Err(e) = launcher.launch(auth_url.as_str()) {
            warn!(error = %e, url = %auth_url, "could not open browser, open the URL manually");
        }
        transition(FlowState::BrowserLaunched);

        transition(FlowState::AwaitingCallback);
        let outcome = tokio::time::timeout(CALLBACK_TIMEOUT, rx).await;

        let result = match outcome {
            Ok(Ok(token)) => {
                transition(FlowState::Succeeded);
                Ok(token)
            },
            Ok(Err(_)) => Err(Error::ListenerClosed),
            Err(_) => {
                transition(FlowState::TimedOut);
                Err(Error::Timeout(CALLBACK_TIMEOUT))
            },
        };

        listener.stop().await;
        transition(FlowState::Stopped);

        let token = result?;
        store
            .persist(&self.session, &token)
            .map_err(Error::Persist)?;
        info!(
            elapsed = ?self.session.started_at.elapsed(),
            "authorization complete"
        );
        Ok(token)
    }
}

fn transition(state: FlowState) {
    debug!(state = ?state, "oauth flow");
}
