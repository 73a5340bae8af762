//! nhka-offline - offline cache and sync coordinator for the NHKA app

use clap::Parser;

mod cache;
mod cli;
mod client;
mod config;
mod error;
mod models;
mod output;
mod worker;

use cli::args::GlobalOptions;
use cli::{CacheCommands, Cli, Commands, ConfigCommands, NotificationCommands};
use error::Result;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(err) = run(cli).await {
        eprintln!("Error: {}", err);
        std::process::exit(1);
    }
}

/// `warn` by default, `debug` with --debug; RUST_LOG always wins
fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp(None)
        .init();
    log::debug!("Debug mode enabled");
}

async fn run(cli: Cli) -> Result<()> {
    let opts = GlobalOptions::from_cli(&cli);

    match cli.command {
        Commands::Fetch {
            url,
            navigate,
            method,
            include_body,
        } => cli::fetch::fetch(&opts, &url, navigate, &method, include_body).await,
        Commands::Classify { url, method } => cli::fetch::classify_url(&opts, &url, &method),
        Commands::Install => cli::lifecycle::install(&opts).await,
        Commands::Activate => cli::lifecycle::activate(&opts).await,
        Commands::SkipWaiting => cli::lifecycle::skip_waiting(&opts).await,
        Commands::State => cli::lifecycle::state(&opts),
        Commands::Cache(cache_cmd) => match cache_cmd {
            CacheCommands::Status => cli::cache::status(&opts),
            CacheCommands::Clear { yes } => cli::cache::clear(&opts, yes),
            CacheCommands::Path => cli::cache::path(&opts),
            CacheCommands::List { bucket } => cli::cache::list(&opts, &bucket),
            CacheCommands::Document { url, name } => {
                cli::cache::document(&opts, &url, &name).await
            }
            CacheCommands::Snapshot { json } => cli::cache::snapshot(&opts, &json),
        },
        Commands::Message { json } => cli::events::message(&opts, &json).await,
        Commands::Sync { tag, periodic } => cli::events::sync(&opts, &tag, periodic).await,
        Commands::Push { payload } => cli::events::push(&opts, payload.as_deref()),
        Commands::Notification(notification_cmd) => match notification_cmd {
            NotificationCommands::Click { action, data } => {
                cli::events::notification_click(&opts, &action, data.as_deref()).await
            }
            NotificationCommands::Close { data } => {
                cli::events::notification_close(&opts, data.as_deref()).await
            }
        },
        Commands::SubscriptionChange { old, new } => {
            cli::events::subscription_change(&opts, old.as_deref(), new.as_deref()).await
        }
        Commands::Config(config_cmd) => match config_cmd {
            ConfigCommands::Init { force } => cli::config::init(&opts, force),
            ConfigCommands::Show => cli::config::show(&opts),
        },
        Commands::Completion { shell } => {
            cli::completions::run(shell);
            Ok(())
        }
    }
}
