//! admitline CLI — the main entry point.
//!
//! Commands:
//! - `serve`     — Start the HTTP chat gateway
//! - `ask`       — Send one message through the full pipeline
//! - `ingest`    — Check a cutoff snapshot before deploying it
//! - `branches`  — List branches in the configured snapshot
//! - `contacts`  — List or export stored contact requests
//! - `init`      — Write a default config file
//! - `doctor`    — Diagnose the local setup
//! - `config`    — Show or locate the effective configuration
//! - `version`   — Print the version

use admitline_core::contact::ContactStatus;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "admitline",
    about = "admitline — admissions conversation service",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ~/.admitline/config.toml)
    #[arg(short, long, global = true, env = "ADMITLINE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP chat gateway
    Serve {
        /// Override the bind address
        #[arg(long)]
        host: Option<String>,

        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a single question and print the reply as JSON
    Ask {
        message: String,

        /// Continue an existing session
        #[arg(short, long)]
        session: Option<String>,
    },

    /// Validate a cutoff snapshot and report what would be loaded
    Ingest {
        /// Snapshot file (defaults to the configured one)
        file: Option<PathBuf>,
    },

    /// List branches present in the cutoff snapshot
    Branches,

    /// Contact request commands
    Contacts {
        #[command(subcommand)]
        action: ContactsAction,
    },

    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Diagnose configuration and data files
    Doctor,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Print the version
    Version,
}

#[derive(Subcommand)]
enum ContactsAction {
    /// List stored requests, newest first, with per-status counts
    List {
        /// Show at most this many
        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        /// Only requests with this status (pending, contacted, resolved)
        #[arg(short, long)]
        status: Option<ContactStatus>,
    },
    /// Export stored requests as CSV
    Export {
        /// Only requests with this status (pending, contacted, resolved)
        #[arg(short, long)]
        status: Option<ContactStatus>,

        /// Output file (defaults to stdout)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration with secrets redacted
    Show,
    /// Validate the configuration
    Validate,
    /// Print the config file path
    Path,
}

fn init_tracing(verbose: bool, json: bool) {
    let filter = if verbose { "admitline=debug,info" } else { "admitline=info,warn" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter).with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    let config_path = cli.config.unwrap_or_else(commands::default_config_path);

    match cli.command {
        Commands::Serve { host, port } => commands::serve::run(&config_path, host, port).await?,
        Commands::Ask { message, session } => commands::ask::run(&config_path, message, session).await?,
        Commands::Ingest { file } => commands::ingest::run(&config_path, file)?,
        Commands::Branches => commands::branches::run(&config_path)?,
        Commands::Contacts { action } => match action {
            ContactsAction::List { limit, status } => commands::contacts::list(&config_path, limit, status).await?,
            ContactsAction::Export { status, out } => {
                commands::contacts::export(&config_path, status, out.as_deref()).await?
            }
        },
        Commands::Init { force } => commands::init::run(&config_path, force)?,
        Commands::Doctor => commands::doctor::run(&config_path).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(&config_path)?,
            ConfigAction::Validate => commands::config_cmd::validate(&config_path)?,
            ConfigAction::Path => commands::config_cmd::path(&config_path),
        },
        Commands::Version => println!("admitline {}", env!("CARGO_PKG_VERSION")),
    }

    Ok(())
}
