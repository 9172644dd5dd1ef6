//! `nexus-gateway routes list|add|remove|reset` — manage the client-model
//! to upstream-provider route table from the CLI.

use anyhow::Result;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use nexus_gateway::config::Config;
use nexus_gateway::server;

pub async fn list(config: Config) -> Result<()> {
    let state = server::build_state(&config).await?;
    let routes = state.store.list_routes().await?;

    let mut table = Table::new();
    table
        .load_preset(comfy_table::presets::UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("ID").fg(Color::Cyan),
            Cell::new("CLIENT MODEL").fg(Color::Cyan),
            Cell::new("TARGET PROVIDER").fg(Color::Cyan),
            Cell::new("TARGET MODEL").fg(Color::Cyan),
            Cell::new("ACTIVE").fg(Color::Cyan),
        ]);

    for route in &routes {
        table.add_row(vec![
            route.id.to_string(),
            route.client_model.clone(),
            route.target_provider.clone(),
            route.target_model.clone(),
            route.is_active.to_string(),
        ]);
    }

    println!("{table}");
    println!("{} route(s)", routes.len());
    Ok(())
}

pub async fn add(client_model: String, target_provider: String, target_model: String, config: Config) -> Result<()> {
    let state = server::build_state(&config).await?;
    let id = state.store.add_route(&client_model, &target_provider, &target_model).await?;
    state.router.reload(&state.store).await?;
    println!("added route #{id}: {client_model} -> {target_provider}/{target_model}");
    Ok(())
}

pub async fn remove(id: i64, config: Config) -> Result<()> {
    let state = server::build_state(&config).await?;
    state.store.remove_route(id).await?;
    state.router.reload(&state.store).await?;
    println!("removed route #{id}");
    Ok(())
}

pub async fn reset(config: Config) -> Result<()> {
    let state = server::build_state(&config).await?;
    state.store.reset_routes().await?;
    state.router.reload(&state.store).await?;
    println!("cleared every manual route");
    Ok(())
}
