use clap::Parser;
use sweat_core::SweatConfig;
use tokio::sync::broadcast;
use tracing_subscriber::{fmt, EnvFilter};

use sweat_server::http::{self, HttpState};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value = "sweat.toml")]
    config: String,

    /// Check the result store and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present (dev convenience, production uses real env vars)
    dotenvy::dotenv().ok();

    let args = Args::parse();

    // Load config
    let config = match SweatConfig::load(&args.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", args.config, e);
            std::process::exit(1);
        }
    };

    // Init logging: RUST_LOG wins, otherwise the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.service.log_level));
    fmt().with_env_filter(filter).init();

    let state = match HttpState::from_config(&config).await {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to initialise analysis service: {}", e);
            std::process::exit(1);
        }
    };

    if args.health {
        let (status, body) = http::health_inner(&state).await;
        if status.is_success() {
            println!("✅ Result store ({}) reachable", body["store"].as_str().unwrap_or("?"));
            if let Some(v) = body["postgresql"].as_str() {
                println!("✅ PostgreSQL: {}", v);
            }
            return Ok(());
        }
        println!(
            "❌ Result store check failed: {}",
            body["error"].as_str().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    let (tx, _rx) = broadcast::channel(1);
    let shutdown_tx = tx.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(());
    });

    http::start_http_server(state, &config, tx.subscribe()).await?;

    Ok(())
}
