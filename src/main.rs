use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use altcache::cache::{CacheKey, CacheValue};
use altcache::config::Config;
use altcache::{AltCache, StaticContext};

#[derive(Parser, Debug)]
#[command(name = "altcache")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Tenant (site) id the entries belong to
    #[arg(short, long, default_value_t = 1)]
    tenant: u64,

    /// Cache mode the operation runs under
    #[arg(short, long, default_value = "cache")]
    mode: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Prepare the configured backend and tear down the others
    Activate {
        #[arg(long)]
        network_wide: bool,
    },
    /// Remove the configured backend's resources
    Deactivate {
        #[arg(long)]
        network_wide: bool,
    },
    /// Print a cached value as JSON
    Get {
        key: String,
        #[arg(short, long, default_value = "")]
        group: String,
    },
    /// Store a value (parsed as JSON, otherwise stored as a string)
    Set {
        key: String,
        value: String,
        #[arg(short, long, default_value = "")]
        group: String,
        /// Seconds to live, 0 = never expires
        #[arg(long, default_value_t = 0)]
        ttl: u64,
    },
    /// Delete one entry
    Delete {
        key: String,
        #[arg(short, long, default_value = "")]
        group: String,
    },
    /// Remove every entry
    Clear,
    /// Print backend and counters as JSON
    Stats,
    /// Validate the configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

    altcache::logging::init_subscriber(&config.logging)
        .map_err(anyhow::Error::msg)
        .context("Failed to initialize logging subsystem")?;

    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("Invalid configuration")?;

    tracing::info!(
        config_file = %args.config.display(),
        backend = %config.cache.backend,
        enabled = config.cache.enabled,
        tenant = args.tenant,
        "Configuration loaded successfully"
    );

    if let Command::CheckConfig = args.command {
        println!("configuration OK");
        return Ok(());
    }

    let context = Arc::new(StaticContext::new().with_tenant(args.tenant));
    let cache = AltCache::new(config.cache.clone(), context, None).await;
    let mode = args.mode.as_str();

    match args.command {
        Command::Activate { network_wide } => {
            if !cache.activate(network_wide).await {
                bail!("Failed to activate {} backend", cache.backend_name());
            }
            println!("activated {}", cache.backend_name());
        }
        Command::Deactivate { network_wide } => {
            if !cache.deactivate(network_wide).await {
                bail!("Failed to deactivate {} backend", cache.backend_name());
            }
            println!("deactivated {}", cache.backend_name());
        }
        Command::Get { key, group } => match cache.get_value(None, mode, &key, &group).await {
            Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
            None => bail!("No cached value for '{}' in group '{}'", key, group),
        },
        Command::Set {
            key,
            value,
            group,
            ttl,
        } => {
            let value: CacheValue =
                serde_json::from_str(&value).unwrap_or(CacheValue::String(value));
            if !cache
                .set_check(false, mode, &CacheKey::from(key.as_str()), &value, ttl, &group)
                .await
            {
                bail!("Failed to store '{}'", key);
            }
        }
        Command::Delete { key, group } => {
            let empty = CacheValue::String(String::new());
            if !cache
                .set_check(false, mode, &CacheKey::from(key.as_str()), &empty, 0, &group)
                .await
            {
                bail!("No entry deleted for '{}'", key);
            }
        }
        Command::Clear => {
            if !cache.clear().await {
                bail!("Failed to clear {} backend", cache.backend_name());
            }
        }
        Command::Stats => {
            let report = serde_json::json!({
                "backend": cache.backend_name(),
                "enabled": config.cache.enabled,
                "fallback_enabled": config.cache.fallback_enabled,
                "stats": cache.stats(),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::CheckConfig => {}
    }

    Ok(())
}
