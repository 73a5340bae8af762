//! CLI command definitions and handlers

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

pub mod args;
pub mod cache;
pub mod completions;
pub mod config;
pub mod context;
pub mod events;
pub mod fetch;
pub mod lifecycle;

pub use args::{GlobalOptions, OutputFormat};
pub use context::WorkerContext;

/// nhka-offline - offline cache and sync coordinator for the NHKA app
#[derive(Parser, Debug)]
#[command(name = "nhka-offline")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Output format (pretty, json)
    #[arg(
        long,
        global = true,
        env = "NHKA_FORMAT",
        default_value = "pretty",
        hide_env = true,
        hide_possible_values = true
    )]
    pub format: OutputFormat,

    /// Override config file location
    #[arg(long, global = true, env = "NHKA_CONFIG", hide_env = true)]
    pub config: Option<String>,

    /// Override cache directory
    #[arg(long, global = true, env = "NHKA_CACHE_DIR", hide_env = true)]
    pub cache_dir: Option<String>,

    /// Treat the network as unreachable
    #[arg(long, global = true, env = "NHKA_OFFLINE", hide_env = true)]
    pub offline: bool,

    /// Enable debug logging
    #[arg(long, global = true, env = "NHKA_DEBUG", hide_env = true)]
    pub debug: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a request through the worker
    Fetch {
        /// Absolute URL, or a path relative to the configured origin
        url: String,

        /// Treat the request as a page navigation
        #[arg(long)]
        navigate: bool,

        /// HTTP method
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,

        /// Print the response body
        #[arg(long)]
        include_body: bool,
    },

    /// Show how a request would be routed
    Classify {
        /// Absolute URL, or a path relative to the configured origin
        url: String,

        /// HTTP method
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,
    },

    /// Install the configured generation and activate it
    Install,

    /// Activate the waiting generation
    Activate,

    /// Promote a waiting generation, if any
    SkipWaiting,

    /// Show the worker registration
    State,

    /// Manage cached responses
    #[command(subcommand)]
    Cache(CacheCommands),

    /// Send a raw message to the worker, e.g. '{"type":"GET_CACHE_STATUS"}'
    Message {
        /// Message envelope as JSON
        json: String,
    },

    /// Fire a background sync event
    Sync {
        /// Sync tag (sync-pastoral-actions, sync-crisis-reports, sync-all)
        tag: String,

        /// Fire a periodic sync instead (tag sync-offline-data)
        #[arg(long)]
        periodic: bool,
    },

    /// Deliver a push message
    Push {
        /// Payload; JSON objects are merged over the notification defaults
        payload: Option<String>,
    },

    /// Simulate user interaction with a notification
    #[command(subcommand)]
    Notification(NotificationCommands),

    /// Announce a push subscription change
    SubscriptionChange {
        /// Previous subscription as JSON ({"endpoint": ..., "keys": {...}})
        #[arg(long)]
        old: Option<String>,

        /// New subscription as JSON
        #[arg(long)]
        new: Option<String>,
    },

    /// Manage the configuration file
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions (static)
    #[command(after_help = "\
Static completions (subcommands/flags only):
  bash:   nhka-offline completion bash > /etc/bash_completion.d/nhka-offline
  zsh:    nhka-offline completion zsh > \"${fpath[1]}/_nhka-offline\"
  fish:   nhka-offline completion fish > ~/.config/fish/completions/nhka-offline.fish")]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Cache management subcommands
#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Show every cache with its entry count
    Status,

    /// Delete every application cache
    Clear {
        /// Skip the confirmation prompt
        #[arg(long, short = 'y')]
        yes: bool,
    },

    /// Show the cache directory
    Path,

    /// List entries of one cache (static, data, documents, cache, or a full name)
    List {
        /// Bucket label or cache name
        bucket: String,
    },

    /// Fetch a document and keep it for offline reading
    Document {
        /// Document URL
        url: String,

        /// Display name broadcast to clients
        name: String,
    },

    /// Store a JSON snapshot for offline reading
    Snapshot {
        /// Snapshot data as JSON
        json: String,
    },
}

/// Notification subcommands
#[derive(Subcommand, Debug)]
pub enum NotificationCommands {
    /// Click a notification, optionally on one of its actions
    Click {
        /// Action identifier (view, respond, rsvp, contact, dismiss)
        #[arg(long, default_value = "")]
        action: String,

        /// Notification data as JSON, e.g. '{"url":"/program"}'
        #[arg(long)]
        data: Option<String>,
    },

    /// Close a notification without clicking it
    Close {
        /// Notification data as JSON, e.g. '{"id":"n-1"}'
        #[arg(long)]
        data: Option<String>,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Write the default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show the effective configuration
    Show,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nhka-offline",
            "fetch",
            "/rest/v1/wyke",
            "--offline",
            "--format",
            "json",
        ])
        .unwrap();

        assert!(cli.offline);
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Fetch { url, method, .. } => {
                assert_eq!(url, "/rest/v1/wyke");
                assert_eq!(method, "GET");
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cache_clear_yes_flag() {
        let cli = Cli::try_parse_from(["nhka-offline", "cache", "clear", "-y"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Cache(CacheCommands::Clear { yes: true })
        ));
    }
}
