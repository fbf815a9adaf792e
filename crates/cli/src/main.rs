mod auth_commands;
mod post_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    story_config::ConfigStore,
    tracing::debug,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "story", version, about = "Write and edit blog posts from Markdown")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file to use instead of the discovered one.
    #[arg(long, global = true, env = "STORY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Register the client and authorize through the browser.
    Init(auth_commands::InitArgs),
    /// Re-run authorization with the saved client settings.
    Auth,
    /// Show information about your blogs.
    Info,
    /// Print a post as JSON.
    Show {
        #[arg(long)]
        blog: String,
        post_id: String,
    },
    /// Publish a Markdown file or directory as a new post.
    Post {
        #[arg(long)]
        blog: String,
        /// Render only, do not upload or publish.
        #[arg(short = 'n', long)]
        dry_run: bool,
        title: String,
        path: PathBuf,
    },
    /// Change the title and/or content of a post.
    Edit {
        #[arg(long)]
        blog: String,
        #[arg(long)]
        title: Option<String>,
        /// Markdown file or directory with the new content.
        #[arg(long)]
        content: Option<PathBuf>,
        /// Render only, do not upload or modify.
        #[arg(short = 'n', long)]
        dry_run: bool,
        post_id: String,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let store = match &cli.config {
        Some(path) => ConfigStore::with_path(path.clone()),
        None => ConfigStore::discover(),
    };
    debug!(config = %store.path().display(), "using config");

    match cli.command {
        Commands::Init(args) => auth_commands::init(&store, args).await,
        Commands::Auth => auth_commands::reauthorize(&store).await,
        Commands::Info => post_commands::info(&store).await,
        Commands::Show { blog, post_id } => post_commands::show(&store, &blog, &post_id).await,
        Commands::Post {
            blog,
            dry_run,
            title,
            path,
        } => {
            post_commands::post(&store, story_blog::NewPost {
                blog,
                title,
                source: path,
                dry_run,
            })
            .await
        },
        Commands::Edit {
            blog,
            title,
            content,
            dry_run,
            post_id,
        } => {
            post_commands::edit(&store, story_blog::PostEdit {
                blog,
                post_id,
                title,
                source: content,
                dry_run,
            })
            .await
        },
    }
}
