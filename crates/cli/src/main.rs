//! callwatch command-line tool
//!
//! Watches an Asterisk PBX for ringing and missed calls and prints them as
//! JSON lines. Logs go to stderr.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use callwatch_call_engine::logging::{setup_logging, LogFormat, LoggingConfig};
use callwatch_call_engine::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "callwatch",
    author,
    version,
    about = "Ringing and missed-call notifications from Asterisk",
    long_about = None
)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "CALLWATCH_CONFIG", default_value = "callwatch.toml")]
    config: PathBuf,

    /// Log filter, overrides `logging.level` (e.g. `debug` or `callwatch_call_engine=trace`)
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON, overrides `logging.format`
    #[arg(long)]
    json_logs: bool,

    /// Include source file and line in log lines
    #[arg(long)]
    log_source: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a JSON line for every ringing and missed call until Ctrl-C
    Monitor,
    /// Ring an internal extension and connect it to a destination
    Call {
        /// Internal extension that picks up first
        internal: String,
        /// Number to dial once the extension answers
        destination: String,
    },
    /// Show registration and in-call status of every internal number
    Extensions,
    /// Load and validate the configuration file
    CheckConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = MonitorConfig::from_file(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    apply_log_overrides(&mut config.logging, &cli)?;
    setup_logging(&config.logging)?;

    match cli.command {
        Command::Monitor => monitor(config).await,
        Command::Call { internal, destination } => call(config, &internal, &destination).await,
        Command::Extensions => extensions(config).await,
        Command::CheckConfig => {
            println!(
                "✅ {} is valid: {} internal numbers, AMI at {}",
                cli.config.display(),
                config.internal_numbers.len(),
                config.ami.address()
            );
            Ok(())
        }
    }
}

fn apply_log_overrides(logging: &mut LoggingConfig, cli: &Cli) -> anyhow::Result<()> {
    if let Some(level) = &cli.log_level {
        logging.level = level.clone();
    }
    if cli.json_logs {
        logging.format = LogFormat::Json;
    }
    if cli.log_source {
        logging.source_location = true;
    }
    logging.validate().context("Invalid --log-level")?;
    Ok(())
}

async fn monitor(config: MonitorConfig) -> anyhow::Result<()> {
    let (sink, mut notifications) = ChannelSink::new();
    let monitor = CallMonitor::start(config, Arc::new(sink))
        .await
        .context("Failed to start call monitor")?;

    info!("👀 Watching calls, press Ctrl-C to stop");
    loop {
        tokio::select! {
            notification = notifications.recv() => {
                let Some(notification) = notification else {
                    warn!("Notification channel closed");
                    break;
                };
                println!("{}", serde_json::to_string(&notification)?);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl-C, shutting down");
                break;
            }
        }
    }

    monitor.stop().await?;
    info!("📊 {}", serde_json::to_string(&monitor.engine().stats())?);
    Ok(())
}

async fn call(config: MonitorConfig, internal: &str, destination: &str) -> anyhow::Result<()> {
    let monitor = CallMonitor::start(config, Arc::new(|_: &str, _: &str, _: bool| {}))
        .await
        .context("Failed to start call monitor")?;

    let result = monitor.click_to_call(internal, destination).await;
    monitor.stop().await?;

    let outcome = result?;
    println!("{}", serde_json::to_string(&outcome)?);
    if !outcome.success {
        anyhow::bail!("Originate {} -> {} failed: {}", internal, destination, outcome.message);
    }
    Ok(())
}

async fn extensions(config: MonitorConfig) -> anyhow::Result<()> {
    let monitor = CallMonitor::start(config, Arc::new(|_: &str, _: &str, _: bool| {}))
        .await
        .context("Failed to start call monitor")?;

    let result = monitor.extension_states().await;
    monitor.stop().await?;

    for (extension, status) in result? {
        println!("{:<10} {}", extension, status);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_flags_override_file_settings() {
        let cli = Cli::parse_from([
            "callwatch",
            "--log-level",
            "debug",
            "--json-logs",
            "--log-source",
            "check-config",
        ]);
        let mut logging = LoggingConfig::default();
        apply_log_overrides(&mut logging, &cli).unwrap();

        assert_eq!(logging.level, "debug");
        assert_eq!(logging.format, LogFormat::Json);
        assert!(logging.source_location);
    }

    #[test]
    fn test_file_settings_kept_without_flags() {
        let cli = Cli::parse_from(["callwatch", "extensions"]);
        let mut logging = LoggingConfig {
            level: "warn".to_string(),
            format: LogFormat::Json,
            source_location: false,
        };
        apply_log_overrides(&mut logging, &cli).unwrap();

        assert_eq!(logging.level, "warn");
        assert_eq!(logging.format, LogFormat::Json);
    }

    #[test]
    fn test_bad_log_level_flag() {
        let cli = Cli::parse_from(["callwatch", "--log-level", "x=loud", "monitor"]);
        let mut logging = LoggingConfig::default();
        assert!(apply_log_overrides(&mut logging, &cli).is_err());
    }
}
