mod blob;
mod cli;
mod config;
mod storage;

use std::io;

use clap::{CommandFactory, Parser};
use color_eyre::Result;
use keepsake_core::storage::BlobStore;
use keepsake_storage::{redact::display_path, resolve_key};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand, KeyCommand};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let Some(command) = cli.command else {
        cli::Cli::command().print_help()?;
        return Ok(());
    };

    let config = config::load()?;
    match command {
        Command::Get { key, output } => {
            let store = storage::store_from_config(&config).await?;
            let key = resource_key(key, &config);
            match output {
                Some(path) => blob::get_to_path(&store, &key, &path).await?,
                None => blob::get(&store, &key, &mut io::stdout().lock()).await?,
            }
        }
        Command::Put { key, input } => {
            let store = storage::store_from_config(&config).await?;
            let key = resource_key(key, &config);
            let written = match input {
                Some(path) => blob::put_from_path(&store, &key, &path).await?,
                None => blob::put(&store, &key, &mut io::stdin().lock()).await?,
            };
            eprintln!("Stored {written} bytes under {key}");
        }
        Command::Delete { key } => {
            let store = storage::store_from_config(&config).await?;
            let key = resource_key(key, &config);
            store.delete(&key).await?;
            eprintln!("Deleted {key}");
        }
        Command::Exists { key } => {
            let store = storage::store_from_config(&config).await?;
            let key = resource_key(key, &config);
            println!("{}", store.exists(&key).await?);
        }
        Command::Health => {
            let store = storage::store_from_config(&config).await?;
            blob::health(&store).await?;
            println!("Storage: ok ({})", store.backend().describe());
        }
        Command::Key(KeyCommand::Show) => show_key(&config)?,
        Command::Config(ConfigCommand::Init) => init_config()?,
        Command::Version => print_version(),
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info. Logs go to stderr so blobs can use stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn resource_key(key: Option<String>, config: &config::Config) -> String {
    key.unwrap_or_else(|| config.storage.data_file.clone())
}

fn show_key(config: &config::Config) -> Result<()> {
    match resolve_key(&config.encryption)? {
        Some(resolved) => {
            let location = resolved
                .path
                .as_deref()
                .map(display_path)
                .unwrap_or_else(|| "(inline configuration)".to_string());
            println!("Key path: {location}");
            println!("Key: {}", resolved.origin.label());
            println!("Key (redacted): {}", resolved.key.preview());
        }
        None => println!("Encryption disabled"),
    }
    Ok(())
}

/// Writes defaults rather than the effective config so env-supplied secrets stay out of the file.
fn init_config() -> Result<()> {
    let path = config::write_default_if_missing(&config::Config::default())?;
    println!("Config initialized at {}", path.display());
    Ok(())
}

fn print_version() {
    println!("keepsake {}", env!("CARGO_PKG_VERSION"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_key_defaults_to_data_file() {
        let mut config = config::Config::default();
        config.storage.data_file = "tasks.json".into();

        assert_eq!(resource_key(None, &config), "tasks.json");
        assert_eq!(resource_key(Some("other".into()), &config), "other");
    }
}
