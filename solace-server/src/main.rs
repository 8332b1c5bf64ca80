use std::sync::Arc;

use clap::Parser;
use solace_core::SolaceConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use solace_server::server;
use solace_server::state::{build_generator, build_store, AppState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "solace.toml")]
    config: String,

    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = match SolaceConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    let store = match build_store(&config).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to open document store: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        match store.health().await {
            Ok(v) => println!("✅ Store ({}) connected: {}", store.name(), v),
            Err(e) => {
                println!("❌ Store health check failed: {}", e);
                std::process::exit(1);
            }
        }
        println!("✅ Solace health check passed");
        return Ok(());
    }

    let generator = build_generator(&config);
    let state = Arc::new(AppState::new(store, generator, config.clone()));

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    if config.sweep.enabled {
        tokio::spawn(solace_server::subsystems::sweep::run_close_sweep_loop(
            state.clone(),
            config.sweep.clone(),
            tx.subscribe(),
        ));
    }

    if config.http.enabled {
        let http_state = state.clone();
        let http_shutdown = tx.subscribe();
        tokio::spawn(async move {
            if let Err(e) = solace_server::http::start_http_server(http_state, http_shutdown).await {
                tracing::error!(error = %e, "HTTP server error");
            }
        });
    }

    let socket_path = config.service.socket_path.clone();
    server::run_unix_server(&socket_path, state, tx.subscribe()).await?;

    Ok(())
}
