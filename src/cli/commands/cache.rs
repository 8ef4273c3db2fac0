//! Cache Command
//!
//! Inspect and maintain the two-tier response cache.
//!
//! Usage:
//!   deepreport cache stats
//!   deepreport cache sweep
//!   deepreport cache clear

use std::sync::Arc;

use tracing::{info, warn};

use crate::cache::{SharedCache, TieredCache};
use crate::cli::ui::Output;
use crate::config::{Config, ConfigLoader};
use crate::types::Result;

/// Open the configured cache, or `None` when caching is disabled
///
/// Runs the startup sweep when configured. A failed sweep is logged and
/// the cache is still returned.
pub async fn open_cache(config: &Config) -> Option<SharedCache> {
    if !config.cache.enabled {
        info!("Response cache disabled");
        return None;
    }

    let cache = Arc::new(TieredCache::from_config(
        &config.cache,
        ConfigLoader::cache_dir(config),
    ));

    if config.cache.sweep_on_start {
        match cache.sweep_expired().await {
            Ok(0) => {}
            Ok(removed) => info!("Removed {} expired cache entries", removed),
            Err(e) => warn!("Startup cache sweep failed: {}", e),
        }
    }

    Some(cache)
}

fn open_for_maintenance(config: &Config) -> TieredCache {
    TieredCache::from_config(&config.cache, ConfigLoader::cache_dir(config))
}

pub async fn stats(config: &Config) -> Result<()> {
    let out = Output::new();
    let cache = open_for_maintenance(config);
    let stats = cache.stats().await?;

    out.section("Cache");
    match cache.durable_dir() {
        Some(dir) => out.field("Directory", dir.display()),
        None => out.field("Directory", "(memory only)"),
    }
    out.field("Durable entries", stats.durable_entries);
    out.field("Durable size", format!("{} bytes", stats.durable_bytes));
    out.field("TTL", format!("{}s", config.cache.ttl_secs));
    out.field("Max entries", stats.fast_capacity);
    Ok(())
}

pub async fn sweep(config: &Config) -> Result<()> {
    let removed = open_for_maintenance(config).sweep_expired().await?;
    Output::new().success(&format!("Removed {} expired cache entries", removed));
    Ok(())
}

pub async fn clear(config: &Config) -> Result<()> {
    let out = Output::new();
    let cache = open_for_maintenance(config);

    let before = cache.stats().await?;
    if before.durable_entries == 0 {
        out.info("Cache is already empty");
        return Ok(());
    }

    let cleared = cache.clear().await?;
    out.success(&format!(
        "Cleared {} cache entries ({} bytes)",
        cleared, before.durable_bytes
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.cache.dir = Some(dir.path().join("cache"));
        config
    }

    #[tokio::test]
    async fn test_open_cache_respects_enabled_flag() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_in(&temp_dir);
        assert!(open_cache(&config).await.is_some());

        config.cache.enabled = false;
        assert!(open_cache(&config).await.is_none());
    }

    #[tokio::test]
    async fn test_clear_removes_durable_entries() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(&temp_dir);

        let cache = open_cache(&config).await.unwrap();
        cache
            .set("prompt", serde_json::json!("answer"), None)
            .await
            .unwrap();

        clear(&config).await.unwrap();
        let stats = open_for_maintenance(&config).stats().await.unwrap();
        assert_eq!(stats.durable_entries, 0);
    }
}
