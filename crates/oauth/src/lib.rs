//! Browser-based OAuth authorization for the blog provider.
//!
//! [`OAuthFlow`] starts a loopback [`CallbackServer`], sends the user to the
//! provider, waits up to [`CALLBACK_TIMEOUT`] for the redirect and saves the
//! resulting token through a [`CredentialStore`].

pub mod callback_server;
pub mod defaults;
pub mod error;
pub mod exchange;
pub mod flow;
pub mod handoff;
pub mod launcher;
pub mod storage;
pub mod types;

pub use {
    callback_server::{CallbackHandle, CallbackMode, CallbackServer},
    defaults::ProviderEndpoints,
    error::{Error, Result},
    exchange::{CodeExchanger, parse_token_response},
    flow::{CALLBACK_TIMEOUT, OAuthFlow},
    launcher::{SystemBrowser, UrlLauncher},
    storage::{CredentialStore, MemoryCredentialStore},
    story_config::FlowKind,
    types::{AccessToken, AuthSession, ClientIdentity},
};
