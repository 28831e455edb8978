//!
//! picnic server binary
//! --------------------
//! Command-line entry point for the booking site backend. Configuration comes from
//! `PICNIC_*` environment variables, overridden by CLI flags.

use anyhow::Result;
use picnic::config::{self, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber; RUST_LOG overrides the default level
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .try_init();

    let args: Vec<String> = std::env::args().collect();
    if config::wants_help(&args) {
        println!("{}", config::HELP);
        return Ok(());
    }

    let cfg = ServerConfig::load()?;
    println!(
        "picnic starting: http={}, store={:?}, identity={:?}, data_dir={}",
        cfg.http_port, cfg.store, cfg.identity, cfg.data_dir.display()
    );
    tracing::info!(target: "startup", "Using port: http={}, site_url={}", cfg.http_port, cfg.site_url);
    picnic::server::run_with_config(cfg).await
}
