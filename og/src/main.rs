//! OpGuard CLI entry point

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::{debug, info};

use opguard::cli::{Cli, Command, OutputFormat, Scenario, get_log_path};
use opguard::config::Config;
use opguard::simulate::{self, SimulationOptions};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    let log_dir = log_path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."));

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: CLI --log-level > config file > INFO
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Read the log level before the full load so loading itself is logged
    let config_log_level = Config::load_log_level(cli.config.as_ref());
    setup_logging(cli.log_level.as_deref(), config_log_level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Simulate {
            scenario,
            role,
            store,
            memory,
            interval_ms,
            format,
        } => {
            let options = SimulationOptions {
                scenario,
                role,
                store_dir: store,
                memory_store: memory,
                interval_ms,
            };
            cmd_simulate(&config, options, format).await
        }
        Command::Config => cmd_config(&config),
    }
}

async fn cmd_simulate(config: &Config, options: SimulationOptions, format: OutputFormat) -> Result<()> {
    debug!(?options, %format, "cmd_simulate: called");
    if options.scenario == Scenario::RefreshBurst || options.scenario == Scenario::FailingOp {
        let interval = options
            .interval_ms
            .unwrap_or_else(|| simulate::millis_u64(config.cooldown.interval_for(options.role.as_deref())));
        if format == OutputFormat::Text && interval >= 5_000 {
            eprintln!("Waiting out a {}ms cooldown; pass --interval-ms to shorten it", interval);
        }
    }

    let report = simulate::run(config, &options)
        .await
        .context(format!("Simulation '{}' failed", options.scenario))?;

    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).context("Failed to serialize report")?;
            println!("{}", json);
        }
    }
    Ok(())
}

fn cmd_config(config: &Config) -> Result<()> {
    debug!("cmd_config: called");
    let yaml = serde_yaml::to_string(config).context("Failed to serialize configuration")?;
    print!("{}", yaml);
    Ok(())
}
