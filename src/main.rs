//! nav-router command line.
//!
//! Loads a route table from a TOML file and exercises it:
//!
//! ```text
//! nav-router --config router.toml routes
//! nav-router --config router.toml resolve /users/42?tab=posts
//! nav-router --config router.toml navigate /login /users/42
//! nav-router --config router.toml watch
//! ```

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::path::PathBuf;

use nav_router::config::watcher::ConfigWatcher;
use nav_router::config::{load_config, RouterConfig};
use nav_router::navigation::NavigationResult;
use nav_router::observability::logging::init_logging;
use nav_router::{RouteLocation, Router};

#[derive(Parser)]
#[command(name = "nav-router")]
#[command(about = "Inspect and exercise a route table", long_about = None)]
struct Cli {
    /// Route table in TOML.
    #[arg(short, long, default_value = "router.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List routes in match order
    Routes,
    /// Resolve a location without navigating
    Resolve {
        /// Path, optionally with query and hash
        location: String,
    },
    /// Navigate through each location in turn
    Navigate {
        #[arg(required = true)]
        locations: Vec<String>,
    },
    /// Reload the route table whenever the config file changes
    Watch,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config.observability);

    tracing::info!(
        path = %cli.config.display(),
        routes = config.routes.len(),
        base = %config.history.base,
        "Configuration loaded"
    );

    let router = Router::from_config(&config)?;

    match cli.command {
        Commands::Routes => {
            let routes: Vec<Value> = router
                .get_routes()
                .iter()
                .map(|record| {
                    json!({
                        "path": record.path(),
                        "name": record.name(),
                        "views": record.components().values().map(|view| view.name()).collect::<Vec<_>>(),
                        "alias": record.is_alias(),
                        "redirect": record.redirect().is_some(),
                        "meta": record.meta(),
                    })
                })
                .collect();
            print_json(&Value::Array(routes))?;
        }
        Commands::Resolve { location } => {
            let resolved = router.resolve(location.as_str())?;
            print_json(&location_json(&resolved))?;
        }
        Commands::Navigate { locations } => {
            router.start().await?;
            for location in locations {
                let result = router.push(location.as_str()).await;
                print_json(&json!({
                    "target": location,
                    "result": outcome(&result),
                    "current": location_json(&router.current_route()),
                }))?;
            }
        }
        Commands::Watch => watch(router, cli.config, config).await?,
    }

    Ok(())
}

async fn watch(router: Router, path: PathBuf, mut config: RouterConfig) -> Result<(), Box<dyn std::error::Error>> {
    let (watcher, mut updates) = ConfigWatcher::new(&path, config.clone());
    let _watcher = watcher.run()?;

    loop {
        tokio::select! {
            Some(new_config) = updates.recv() => {
                if new_config.matching != config.matching || new_config.history != config.history {
                    tracing::warn!("Matching and history settings apply on restart only");
                }
                router.reload_routes(&new_config.routes)?;
                config = new_config;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
        }
    }
    Ok(())
}

fn outcome(result: &NavigationResult) -> Value {
    match result {
        Ok(None) => json!("confirmed"),
        Ok(Some(failure)) => json!({
            "failure": failure.kind.as_str(),
            "message": failure.to_string(),
        }),
        Err(error) => json!({ "error": error.to_string() }),
    }
}

fn location_json(location: &RouteLocation) -> Value {
    json!({
        "path": location.path,
        "fullPath": location.full_path,
        "href": location.href,
        "name": location.name,
        "params": location.params,
        "query": location.query,
        "hash": location.hash,
        "matched": location.matched.iter().map(|record| record.path()).collect::<Vec<_>>(),
        "meta": location.meta,
        "redirectedFrom": location.redirected_from.as_ref().map(|from| from.full_path.clone()),
    })
}

fn print_json(value: &Value) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
