use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "nexus-gateway", version, about = "Multi-protocol LLM gateway")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Start the gateway server (default)
    Start {
        /// Run in daemon mode (background process)
        #[arg(short, long)]
        daemon: bool,

        /// Path to PID file
        #[arg(short, long)]
        pid_file: Option<PathBuf>,
    },

    /// Stop a running gateway instance
    Stop {
        /// Path to PID file
        #[arg(short, long)]
        pid_file: Option<PathBuf>,

        /// Force kill if graceful shutdown times out
        #[arg(short, long)]
        force: bool,

        /// Timeout in seconds for graceful shutdown
        #[arg(short, long, default_value = "30")]
        timeout: u64,
    },

    /// Reload the token cache and route table without restarting
    Reload {
        /// Path to PID file
        #[arg(short, long)]
        pid_file: Option<PathBuf>,
    },

    /// Manage linked upstream accounts
    Accounts {
        #[command(subcommand)]
        action: AccountsCommands,
    },

    /// Manage the client-model to provider route table
    Routes {
        #[command(subcommand)]
        action: RoutesCommands,
    },

    /// Dry-run route resolution and token availability for a client model id
    Test {
        /// Client-facing model id to resolve, e.g. "gpt-4o"
        #[arg(long)]
        endpoint: String,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AccountsCommands {
    /// List every linked account
    List,

    /// Promote an account to primary
    Promote { id: String },

    /// Force an immediate token refresh
    Refresh { id: String },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RoutesCommands {
    /// List the active route table
    List,

    /// Add or update a route
    Add {
        client_model: String,
        target_provider: String,
        target_model: String,
    },

    /// Remove a route by id
    Remove { id: i64 },

    /// Clear every manual route
    Reset,
}

impl Cli {
    /// Get the command to execute, defaulting to Start if none provided
    pub fn get_command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Start { daemon: false, pid_file: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_command_is_start() {
        let cli = Cli { config: PathBuf::from("config.toml"), command: None };
        match cli.get_command() {
            Commands::Start { daemon, pid_file } => {
                assert!(!daemon);
                assert!(pid_file.is_none());
            }
            _ => panic!("expected Start command"),
        }
    }

    #[test]
    fn parses_start_with_daemon() {
        let cli = Cli::try_parse_from(["nexus-gateway", "start", "--daemon"]).unwrap();
        match cli.get_command() {
            Commands::Start { daemon, .. } => assert!(daemon),
            _ => panic!("expected Start command"),
        }
    }

    #[test]
    fn parses_stop_timeout() {
        let cli = Cli::try_parse_from(["nexus-gateway", "stop", "--timeout", "60"]).unwrap();
        match cli.get_command() {
            Commands::Stop { timeout, .. } => assert_eq!(timeout, 60),
            _ => panic!("expected Stop command"),
        }
    }

    #[test]
    fn parses_accounts_promote() {
        let cli = Cli::try_parse_from(["nexus-gateway", "accounts", "promote", "acc-1"]).unwrap();
        match cli.get_command() {
            Commands::Accounts { action: AccountsCommands::Promote { id } } => assert_eq!(id, "acc-1"),
            _ => panic!("expected Accounts::Promote"),
        }
    }

    #[test]
    fn parses_routes_add() {
        let cli = Cli::try_parse_from(["nexus-gateway", "routes", "add", "gpt-4o", "openrouter", "vendor/model"]).unwrap();
        match cli.get_command() {
            Commands::Routes { action: RoutesCommands::Add { client_model, target_provider, target_model } } => {
                assert_eq!(client_model, "gpt-4o");
                assert_eq!(target_provider, "openrouter");
                assert_eq!(target_model, "vendor/model");
            }
            _ => panic!("expected Routes::Add"),
        }
    }

    #[test]
    fn parses_test_endpoint() {
        let cli = Cli::try_parse_from(["nexus-gateway", "test", "--endpoint", "gpt-4o"]).unwrap();
        match cli.get_command() {
            Commands::Test { endpoint } => assert_eq!(endpoint, "gpt-4o"),
            _ => panic!("expected Test command"),
        }
    }
}
