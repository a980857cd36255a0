use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use bookstore_gateway::RouteTable;
use bookstore_kernel::settings::Settings;

/// Bookstore catalog API and its gateway
#[derive(Parser, Debug)]
#[command(name = "bookstore", version, about, long_about = None)]
struct Cli {
    /// Configuration directory (defaults to $BOOKSTORE_CONFIG_DIR, then ./config)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Environment overlay: local, staging or production (defaults to $BOOKSTORE_ENV)
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the books API server
    Serve,
    /// Run the reverse-proxy gateway
    Gateway,
    /// Apply pending database migrations and exit
    Migrate,
    /// Validate and print the gateway route table
    Routes,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_with(cli.config_dir, cli.env)
        .with_context(|| "failed to load bookstore settings")?;
    bookstore_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve => bookstore_app::run_api(&settings).await,
        Command::Gateway => bookstore_gateway::serve(&settings.gateway).await,
        Command::Migrate => migrate(&settings).await,
        Command::Routes => print_routes(&settings),
    }
}

async fn migrate(settings: &Settings) -> anyhow::Result<()> {
    let db = bookstore_app::connect(settings).await?;
    let applied = bookstore_app::migrate(&db, &bookstore_app::registry()).await?;
    db.close().await;

    println!("applied {applied} migration(s) to {}", settings.database.url);
    Ok(())
}

fn print_routes(settings: &Settings) -> anyhow::Result<()> {
    let table = RouteTable::from_settings(&settings.gateway.routes)
        .context("failed to load gateway routes")?;

    if table.is_empty() {
        println!("no gateway routes configured");
        return Ok(());
    }

    for route in table.routes() {
        let methods = if route.methods().is_empty() {
            "*".to_string()
        } else {
            route
                .methods()
                .iter()
                .map(|method| method.as_str())
                .collect::<Vec<_>>()
                .join(",")
        };
        println!(
            "{:<24} {:<24} -> {}",
            route.upstream_path(),
            methods,
            route.downstream_url()
        );
    }
    Ok(())
}
