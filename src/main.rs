//! DecentralBet — pari-mutuel wagering ledger and settlement engine.
//!
//! Entry point. Loads configuration, initialises structured logging,
//! builds the configured ledger backend and the engine over it, serves the
//! dashboard, and logs confirmed ledger facts until shutdown.

use anyhow::{Context, Result};
use secrecy::Secret;
use std::sync::Arc;
use tracing::{info, warn};

use decentralbet::config::AppConfig;
use decentralbet::dashboard;
use decentralbet::engine::BettingEngine;
use decentralbet::ledger::memory::InMemoryLedger;
use decentralbet::ledger::remote::RemoteLedger;
use decentralbet::ledger::Ledger;

const BANNER: &str = r#"
 ____                      _             _ ____       _
|  _ \  ___  ___ ___ _ __ | |_ _ __ __ _| | __ )  ___| |_
| | | |/ _ \/ __/ _ \ '_ \| __| '__/ _` | |  _ \ / _ \ __|
| |_| |  __/ (_|  __/ | | | |_| | | (_| | | |_) |  __/ |_
|____/ \___|\___\___|_| |_|\__|_|  \__,_|_|____/ \___|\__|

  Pari-mutuel wagering ledger & settlement engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        platform = %cfg.platform.name,
        owner = %cfg.platform.owner_account,
        fee_pct = %cfg.platform.fee_pct,
        ledger_backend = %cfg.ledger.backend,
        "DecentralBet engine starting up"
    );

    // -- Ledger backend ---------------------------------------------------

    let ledger: Arc<dyn Ledger> = match cfg.ledger.backend.as_str() {
        "remote" => {
            let base_url = cfg
                .ledger
                .base_url
                .as_deref()
                .context("ledger.base_url is required for the remote backend")?;
            let auth_token = match cfg.ledger.auth_token_env.as_deref() {
                Some(env_name) => Some(Secret::new(AppConfig::resolve_env(env_name)?)),
                None => None,
            };
            info!(base_url, "Using remote ledger backend");
            Arc::new(RemoteLedger::new(base_url, auth_token)?)
        }
        "memory" => {
            info!("Using in-memory ledger backend");
            Arc::new(InMemoryLedger::new(&cfg.platform.owner_account))
        }
        other => {
            warn!(backend = other, "Unknown ledger backend, defaulting to memory");
            Arc::new(InMemoryLedger::new(&cfg.platform.owner_account))
        }
    };

    // -- Engine -----------------------------------------------------------

    let engine = Arc::new(BettingEngine::new(
        ledger,
        &cfg.platform.owner_account,
        cfg.platform.fee_pct,
    )?);

    // Log every confirmed ledger fact.
    spawn_fact_logger(engine.clone());

    // -- Dashboard --------------------------------------------------------

    if cfg.dashboard.enabled {
        dashboard::spawn_dashboard(engine.clone(), cfg.dashboard.port)?;
    } else {
        info!("Dashboard disabled by configuration");
    }

    // -- Run until shutdown -----------------------------------------------

    info!(
        ledger = engine.ledger_name(),
        "Engine ready. Press Ctrl+C to stop."
    );
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. DecentralBet engine shut down cleanly.");

    Ok(())
}

/// Forward confirmed ledger facts to the log.
fn spawn_fact_logger(engine: Arc<BettingEngine>) {
    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => info!(fact = %event, "Ledger fact confirmed"),
                Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Fact stream lagged; projections should re-read snapshots");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("decentralbet=info"));

    let json_logging = std::env::var("DECENTRALBET_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
