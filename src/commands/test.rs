//! `nexus-gateway test --endpoint <model>` — dry-runs route resolution and
//! token availability for a client-facing model id, without making an
//! upstream call. Mirrors `handlers::operator::test_endpoint`'s logic for
//! the CLI.

use anyhow::Result;
use colored::Colorize;
use nexus_gateway::config::Config;
use nexus_gateway::router::Protocol;
use nexus_gateway::server;

pub async fn execute(endpoint: String, config: Config) -> Result<()> {
    let state = server::build_state(&config).await?;

    match state.router.resolve(&endpoint, Protocol::OpenAi) {
        Ok(resolved) => {
            println!("{} {endpoint}", "endpoint:".bold());
            println!("  {} {}", "provider:".cyan(), resolved.provider);
            println!("  {} {}", "target model:".cyan(), resolved.model);

            match state.token_manager.get_primary_or_default().await {
                Ok(_) => println!("  {} {}", "token:".cyan(), "available".green()),
                Err(e) => println!("  {} {} ({e})", "token:".cyan(), "unavailable".red()),
            }
        }
        Err(e) => {
            println!("{} {endpoint}", "endpoint:".bold());
            println!("  {} {e}", "resolution failed:".red());
        }
    }

    Ok(())
}
