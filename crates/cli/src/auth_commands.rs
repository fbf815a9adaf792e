use std::io::{self, BufRead, Write};

use {
    anyhow::{Context, Result, bail},
    clap::{Args, ValueEnum},
    story_config::{ConfigStore, DEFAULT_REDIRECT_PATH, DEFAULT_REDIRECT_PORT, FlowKind},
    story_oauth::{AuthSession, ClientIdentity, OAuthFlow, ProviderEndpoints, SystemBrowser},
};

#[derive(Clone, Copy, ValueEnum)]
pub enum FlowArg {
    /// Authorization code, exchanged for a token by the local listener.
    Code,
    /// Token returned directly in the redirect fragment.
    Implicit,
}

impl From<FlowArg> for FlowKind {
    fn from(flow: FlowArg) -> Self {
        match flow {
            FlowArg::Code => Self::Code,
            FlowArg::Implicit => Self::Implicit,
        }
    }
}

#[derive(Args)]
pub struct InitArgs {
    /// Local port the provider redirects back to.
    #[arg(long, default_value_t = DEFAULT_REDIRECT_PORT)]
    rdport: u16,
    /// Path of the redirect URI on the local listener.
    #[arg(long, default_value = DEFAULT_REDIRECT_PATH)]
    rdpath: String,
    #[arg(long, value_enum, default_value = "code")]
    flow: FlowArg,
    /// Client id of the registered app. Prompted for when missing.
    #[arg(long)]
    client_id: Option<String>,
    /// Client secret, needed by the code flow. Prompted for when missing.
    #[arg(long)]
    secret: Option<String>,
}

/// Set up a new client and authorize it. Nothing is saved unless a token arrives.
pub async fn init(store: &ConfigStore, args: InitArgs) -> Result<()> {
    let flow = FlowKind::from(args.flow);
    let identity = {
        let mut input = io::stdin().lock();
        let client_id = match args.client_id {
            Some(id) => id,
            None => prompt(&mut input, "Client ID")?,
        };
        let identity = ClientIdentity::new(client_id);
        match (flow, args.secret) {
            (FlowKind::Code, Some(secret)) => identity.with_secret(secret),
            (FlowKind::Code, None) => identity.with_secret(prompt(&mut input, "Client secret")?),
            (FlowKind::Implicit, _) => identity,
        }
    };

    let session = AuthSession::new(identity, args.rdport, &args.rdpath, flow)?;
    println!("Callback URL of your app: {}", session.redirect_uri());
    authorize(store, session).await
}

/// Authorize again with the client settings already in the config.
pub async fn reauthorize(store: &ConfigStore) -> Result<()> {
    if !store.exists() {
        bail!("no config at {}, try `story init` first", store.path().display());
    }
    let config = store.load()?;
    if config.client_id.is_empty() {
        bail!("config has no client id, try `story init` first");
    }
    let session = AuthSession::from_config(&config)?;
    authorize(store, session).await
}

async fn authorize(store: &ConfigStore, session: AuthSession) -> Result<()> {
    let flow = OAuthFlow::new(session, ProviderEndpoints::from_env());
    println!("Opening browser for authorization...");
    println!("If it does not open, visit:\n{}", flow.authorization_url()?);

    flow.authorize(&SystemBrowser, store)
        .await
        .context("authorization failed")?;

    println!("Authorized. Credentials saved to {}", store.path().display());
    Ok(())
}

fn prompt(input: &mut impl BufRead, label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    read_answer(input, label)
}

fn read_answer(input: &mut impl BufRead, label: &str) -> Result<String> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("no {label} given");
    }
    let answer = line.trim();
    if answer.is_empty() {
        bail!("{label} must not be empty");
    }
    Ok(answer.to_string())
}
