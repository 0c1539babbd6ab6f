//! Tabs Aside demo binary.
//!
//! Runs the session lifecycle against the in-memory host: tabs are set
//! aside into a session, restored, edited and set aside again. Set
//! `RUST_LOG=tabs_aside=debug` to follow the state machine.

use std::time::Duration;

use tabs_aside::app::{App, AppResult};
use tabs_aside::database::Database;
use tabs_aside::managers::tab_manager::TabHostTrait;
use tabs_aside::services::settings_engine::SettingsEngine;
use tabs_aside::types::tab::TabCreateProperties;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> AppResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!();
    println!("Tabs Aside v{} (demo mode)", env!("CARGO_PKG_VERSION"));
    println!();

    let config_path = std::env::temp_dir()
        .join("tabs-aside-demo")
        .join("options.json")
        .to_string_lossy()
        .to_string();
    let app = App::with_parts(Database::open_in_memory()?, SettingsEngine::new(Some(config_path)));
    app.startup().await?;

    section("Set tabs aside");
    let mut tabs = Vec::new();
    for url in [
        "https://www.rust-lang.org/",
        "https://docs.rs/tokio",
        "https://crates.io/crates/tracing",
    ] {
        tabs.push(
            app.tabs
                .create_tab(TabCreateProperties {
                    url: Some(url.to_string()),
                    ..Default::default()
                })
                .await?,
        );
    }
    let session_id = app.sessions.aside_tabs(tabs, "Research").await?;
    print_sessions(&app).await?;

    section("Restore");
    let session = app.sessions.restore(&session_id).await?;
    println!("  {} live tabs, open tabs in host: {}", session.tab_count(), app.tabs.tab_count());

    section("Close one tab");
    if let Some(tab_id) = session.tab_ids().first().copied() {
        app.tabs.remove_tabs(&[tab_id]).await?;
    }
    tokio::time::sleep(Duration::from_millis(400)).await;
    print_sessions(&app).await?;

    section("Set aside again");
    app.sessions.set_aside(&session_id).await?;
    print_sessions(&app).await?;

    app.shutdown().await;
    println!();
    Ok(())
}

fn section(name: &str) {
    println!("───────────────────────────────────────────────────────────────");
    println!("  {}", name);
    println!("───────────────────────────────────────────────────────────────");
}

async fn print_sessions(app: &App) -> AppResult<()> {
    for summary in app.sessions.list_sessions().await? {
        println!(
            "  {:<12} {:>2} records  {:?}",
            summary.title, summary.record_count, summary.state
        );
    }
    Ok(())
}
