//! Loopback HTTP listener that receives the OAuth redirect.
//!
//! The listener serves a single redirect path. In code mode the handler
//! performs the token exchange itself; in implicit mode it serves a relay page
//! that forwards the URL fragment to `/success`. The first token extracted is
//! handed to the waiting flow through a [`Handoff`]; everything after that is
//! still answered but never delivered.

use std::{collections::HashMap, net::Ipv4Addr, sync::Arc, time::Duration};

use {
    axum::{
        Router,
        extract::{Query, State},
        http::{StatusCode, Uri},
        response::{Html, IntoResponse, Response},
        routing::get,
    },
    tokio::{net::TcpListener, sync::oneshot, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    exchange::CodeExchanger,
    handoff::{Handoff, handoff},
    types::{AccessToken, SUCCESS_PATH, normalize_redirect_path},
};

/// How long `stop()` lets open connections finish before aborting the server.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Page served at the redirect path in implicit mode. The token arrives in
/// the fragment, which browsers never send, so a script forwards it.
const IMPLICIT_RELAY_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8">
<title>Authentication Result</title>
</head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<div id="result">Completing authentication&hellip;</div>
<script type="text/javascript">
if (window.location.hash.length <= 1) {
    document.getElementById("result").textContent = "Authentication failed: no token in redirect";
} else {
    window.location.replace(window.location.protocol + "//" + window.location.host + "/success?" + window.location.hash.substring(1));
}
</script>
</body>
</html>"#;

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>story</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>&#10004; Authentication successful</h2>
<p>You can close this tab and return to the terminal.</p>
<script type="text/javascript">setTimeout(function () { window.close(); }, 1000);</script>
</body>
</html>"#;

/// What the redirect path does with an incoming request.
pub enum CallbackMode {
    /// Expect `?code=`; exchange it server-side.
    Code(CodeExchanger),
    /// Serve the fragment relay page; tokens arrive at `/success`.
    Implicit,
}

#[derive(Clone)]
struct CallbackState {
    handoff: Handoff<AccessToken>,
    exchanger: Option<Arc<CodeExchanger>>,
}

/// Starts callback listeners.
pub struct CallbackServer;

impl CallbackServer {
    /// Bind `127.0.0.1:port` and serve `/{path}` in the background.
    ///
    /// Returns once the socket is bound. The receiver yields at most one token.
    pub async fn start(
        port: u16,
        path: &str,
        mode: CallbackMode,
    ) -> Result<(CallbackHandle, oneshot::Receiver<AccessToken>)> {
        let path = normalize_redirect_path(path)?;
        let (handoff, rx) = handoff();
        let app = build_callback_router(&path, mode, handoff)?;

        let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
            .await
            .map_err(|source| Error::Bind { port, source })?;
        let port = listener
            .local_addr()
            .map_err(|source| Error::Bind { port, source })?
            .port();

        let shutdown = CancellationToken::new();
        let signal = shutdown.clone().cancelled_owned();
        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(signal)
                .await
            {
                warn!(error = %e, "callback listener failed");
            }
            debug!(port, "callback listener exited");
        });

        info!(port, path = %path, "OAuth callback listener started");
        Ok((
            CallbackHandle {
                port,
                shutdown,
                task: Some(task),
            },
            rx,
        ))
    }
}

/// Owns a running listener. Stopping (or dropping) it releases the port.
pub struct CallbackHandle {
    port: u16,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CallbackHandle {
    /// The bound port.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_stopped(&self) -> bool {
        self.task.is_none()
    }

    /// Shut the listener down and wait until the socket is closed.
    ///
    /// Later calls do nothing.
    pub async fn stop(&mut self) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        self.shutdown.cancel();
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut task).await.is_err() {
            debug!(port = self.port, "callback listener still busy, aborting");
            task.abort();
            let _ = task.await;
        }
        debug!(port = self.port, "callback listener stopped");
    }
}

impl Drop for CallbackHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            self.shutdown.cancel();
            task.abort();
        }
    }
}

fn build_callback_router(
    path: &str,
    mode: CallbackMode,
    handoff: Handoff<AccessToken>,
) -> Result<Router> {
    let route = format!("/{path}");
    let router = match mode {
        CallbackMode::Code(exchanger) => Router::new()
            .route(&route, get(code_callback))
            .with_state(CallbackState {
                handoff,
                exchanger: Some(Arc::new(exchanger)),
            }),
        CallbackMode::Implicit => {
            if path == SUCCESS_PATH {
                return Err(Error::InvalidRedirectPath(path.to_string()));
            }
            Router::new()
                .route(&route, get(implicit_relay_page))
                .route(&format!("/{SUCCESS_PATH}"), get(implicit_success))
                .with_state(CallbackState {
                    handoff,
                    exchanger: None,
                })
        },
    };
    Ok(router.fallback(not_found))
}

async fn code_callback(
    State(state): State<CallbackState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    debug!("authorization redirect received");

    if let Some(error) = query.get("error") {
        let detail = query.get("error_description").unwrap_or(error);
        warn!(error = %error, "provider denied authorization");
        return failure_page(detail);
    }

    let Some(code) = query.get("code").filter(|c| !c.is_empty()) else {
        return failure_page("missing authorization code");
    };

    if state.handoff.is_spent() {
        debug!("token already delivered, ignoring repeated callback");
        return Html(SUCCESS_PAGE).into_response();
    }

    let Some(exchanger) = state.exchanger.as_ref() else {
        return failure_page("listener is not configured for the code flow");
    };

    match exchanger.exchange(code).await {
        Ok(token) => {
            if !state.handoff.offer(token) {
                debug!("token already delivered, dropping exchanged token");
            }
            Html(SUCCESS_PAGE).into_response()
        },
        Err(e) => {
            warn!(error = %e, "authorization code exchange failed");
            failure_page(&e.to_string())
        },
    }
}

async fn implicit_relay_page() -> Html<&'static str> {
    debug!("serving implicit-flow relay page");
    Html(IMPLICIT_RELAY_PAGE)
}

async fn implicit_success(
    State(state): State<CallbackState>,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if let Some(error) = query.get("error") {
        warn!(error = %error, "provider denied authorization");
        return failure_page(query.get("error_description").unwrap_or(error));
    }

    let Some(token) = query.get("access_token").filter(|t| !t.is_empty()) else {
        return failure_page("missing access_token");
    };

    if !state.handoff.offer(AccessToken::new(token.as_str())) {
        debug!("token already delivered, ignoring repeated callback");
    }
    Html(SUCCESS_PAGE).into_response()
}

async fn not_found(uri: Uri) -> StatusCode {
    debug!(uri = %uri, "unknown callback path");
    StatusCode::NOT_FOUND
}

fn failure_page(message: &str) -> Response {
    let body = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="UTF-8"><title>story</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h2>&#10008; Authentication failed</h2>
<p>{}</p>
</body>
</html>"#,
        escape_html(message)
    );
    (StatusCode::BAD_REQUEST, Html(body)).into_response()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
