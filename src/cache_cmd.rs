//! Cache maintenance commands: `cache install`, `cache activate`, `cache list`.

use anyhow::Result;

use crate::config::Config;
use crate::gateway::CacheGateway;

pub async fn run_install(config: &Config) -> Result<()> {
    let gateway = CacheGateway::from_config(config)?;
    let n = gateway.install().await?;
    println!("Installed {} core assets into {}", n, gateway.store_name());
    Ok(())
}

pub async fn run_activate(config: &Config) -> Result<()> {
    let gateway = CacheGateway::from_config(config)?;
    let deleted = gateway.activate().await?;
    if deleted.is_empty() {
        println!("No stale cache stores.");
    }
    for name in deleted {
        println!("Deleted stale cache store {}", name);
    }
    Ok(())
}

pub async fn run_list(config: &Config) -> Result<()> {
    let gateway = CacheGateway::from_config(config)?;
    let storage = gateway.storage();
    let stores = storage.keys().await?;
    if stores.is_empty() {
        println!("No cache stores in {}", config.cache.dir.display());
        return Ok(());
    }

    println!("{:<32} {:>8}  STATUS", "STORE", "ENTRIES");
    for store in stores {
        let entries = storage.entries(&store).await?;
        let status = if store == gateway.store_name() {
            "current"
        } else {
            "stale"
        };
        println!("{:<32} {:>8}  {}", store, entries.len(), status);
    }
    Ok(())
}
