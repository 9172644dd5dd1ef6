use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;
mod daemon;
mod pid;

use nexus_gateway::config::load_config;
use nexus_gateway::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // On macOS, disable fork safety check before any library initialization;
    // must happen before CLI parsing or any other library calls.
    #[cfg(target_os = "macos")]
    unsafe {
        std::env::set_var("OBJC_DISABLE_INITIALIZE_FORK_SAFETY", "YES");
    }

    let args = cli::Cli::parse();
    let command = args.get_command();

    // `start` defers tracing init to commands::start::execute, since daemon
    // mode needs it initialized after fork() against the redirected log fds.
    if !matches!(command, cli::Commands::Start { .. }) {
        init_tracing();
    }

    let config = load_config()?;

    match command {
        cli::Commands::Start { daemon, pid_file } => {
            commands::start::execute(daemon, pid_file, config).await?;
        }
        cli::Commands::Stop { pid_file, force, timeout } => {
            commands::stop::execute(pid_file, force, timeout).await?;
        }
        cli::Commands::Reload { pid_file } => {
            commands::reload::execute(pid_file).await?;
        }
        cli::Commands::Accounts { action } => match action {
            cli::AccountsCommands::List => commands::accounts::list(config).await?,
            cli::AccountsCommands::Promote { id } => commands::accounts::promote(id, config).await?,
            cli::AccountsCommands::Refresh { id } => commands::accounts::refresh(id, config).await?,
        },
        cli::Commands::Routes { action } => match action {
            cli::RoutesCommands::List => commands::routes::list(config).await?,
            cli::RoutesCommands::Add { client_model, target_provider, target_model } => {
                commands::routes::add(client_model, target_provider, target_model, config).await?
            }
            cli::RoutesCommands::Remove { id } => commands::routes::remove(id, config).await?,
            cli::RoutesCommands::Reset => commands::routes::reset(config).await?,
        },
        cli::Commands::Test { endpoint } => {
            commands::test::execute(endpoint, config).await?;
        }
        cli::Commands::Version => {
            println!("nexus-gateway v{}", env!("CARGO_PKG_VERSION"));
        }
    }

    Ok(())
}
