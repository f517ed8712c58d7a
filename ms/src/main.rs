use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use log::info;

use markerstore::cli::{Cli, Command};
use markerstore::config::Config;
use markerstore::{FileMarkerStore, MarkerStore};

fn setup_logging() -> Result<()> {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    let store_path = cli.store.unwrap_or(config.store_path);

    info!("markerstore starting at {}", store_path.display());
    let store = FileMarkerStore::open(&store_path).context("Failed to open marker store")?;

    match cli.command {
        Command::Get { key } => match store.get(&key)? {
            Some(value) => println!("{}", value),
            None => {
                eprintln!("{} No marker: {}", "✗".red(), key);
                std::process::exit(1);
            }
        },
        Command::Set { key, value } => {
            store.set(&key, &value)?;
            println!("{} Set {}", "✓".green(), key.cyan());
        }
        Command::Clear { key } => {
            if store.clear(&key)? {
                println!("{} Cleared {}", "✓".green(), key.cyan());
            } else {
                println!("No marker: {}", key);
            }
        }
        Command::List => {
            let entries = store.entries()?;
            if entries.is_empty() {
                println!("No markers found");
            } else {
                for (key, marker) in entries {
                    println!(
                        "{} = {} {}",
                        key.yellow(),
                        marker.value,
                        marker.set_at.to_rfc3339().dimmed()
                    );
                }
            }
        }
    }

    Ok(())
}
