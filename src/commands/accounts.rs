//! `nexus-gateway accounts list|promote|refresh` — manage linked upstream
//! OAuth accounts from the CLI.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use nexus_gateway::config::Config;
use nexus_gateway::server;

pub async fn list(config: Config) -> Result<()> {
    let state = server::build_state(&config).await?;
    let accounts = state.store.list_accounts().await?;

    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("EMAIL").fg(Color::Cyan),
            Cell::new("PROVIDER").fg(Color::Cyan),
            Cell::new("PRIMARY").fg(Color::Cyan),
            Cell::new("ACTIVE").fg(Color::Cyan),
            Cell::new("EXPIRES AT").fg(Color::Cyan),
        ]);

    for account in &accounts {
        table.add_row(vec![
            account.id.clone(),
            account.email.clone(),
            account.provider.clone(),
            account.is_primary.to_string(),
            account.is_active.to_string(),
            account.expires_at.to_string(),
        ]);
    }

    println!("{table}");
    println!("{} account(s)", accounts.len());
    Ok(())
}

pub async fn promote(id: String, config: Config) -> Result<()> {
    let state = server::build_state(&config).await?;
    state.store.promote_account(&id).await?;
    state.token_manager.rebuild_cache().await?;
    println!("promoted '{id}' to primary");
    Ok(())
}

pub async fn refresh(id: String, config: Config) -> Result<()> {
    let state = server::build_state(&config).await?;
    let token = state.token_manager.force_refresh(&id).await?;
    println!("refreshed '{id}', new expiry: {}", token.expires_at);
    Ok(())
}
