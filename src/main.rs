// src/main.rs

//! The main entry point for the bemfa-bridge daemon.

use anyhow::Result;
use bemfa_bridge::config::Config;
use bemfa_bridge::core::client::BrokerClient;
use bemfa_bridge::dispatch::{Dispatcher, PowerActions};
use futures::StreamExt;
use std::env;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("bemfa-bridge version {VERSION}");
        return Ok(());
    }

    // The configuration path can be provided via a --config flag; otherwise
    // it defaults to "config.toml".
    let config_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
        .unwrap_or("config.toml");

    // The daemon cannot run without a valid configuration.
    let mut config = match Config::from_file(config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{config_path}\": {e}");
            std::process::exit(1);
        }
    };

    // Override the topic if provided as a command-line argument.
    if let Some(topic_index) = args.iter().position(|arg| arg == "--topic") {
        match args.get(topic_index + 1) {
            Some(topic) => config.topic = topic.clone(),
            None => {
                eprintln!("--topic flag requires a value");
                std::process::exit(1);
            }
        }
    }

    // Get the log level from the env var, falling back to the config.
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .compact()
        .with_ansi(true)
        .init();

    info!(
        "Starting bemfa-bridge {VERSION} for topic '{}' (broker {}:{})",
        config.topic, config.broker.host, config.broker.port
    );

    let actions = PowerActions::new(config.wake.clone(), config.suspend.clone());
    let dispatcher = Dispatcher::new(Arc::new(actions));
    let client = BrokerClient::new(config.session_config());

    // The record stream reconnects transparently; it only ends when the
    // client hits an unclassified error. There is no shutdown signal: the
    // daemon runs until killed externally.
    let mut records = client.connect();
    while let Some(record) = records.next().await {
        dispatcher.dispatch(&record).await;
    }

    error!("Broker client terminated due to an unrecoverable error.");
    Err(anyhow::anyhow!("broker client terminated unexpectedly"))
}
