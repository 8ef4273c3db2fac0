//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/deepreport/config.toml)
//! 3. Project config (.deepreport/config.toml)
//! 4. Explicit config file (--config)
//! 5. Environment variables (DEEPREPORT_<SECTION>__<KEY>)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::types::Config;
use crate::types::{ReportError, Result};

/// Environment variable prefix
const ENV_PREFIX: &str = "DEEPREPORT_";

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain using Figment:
    /// defaults → global → project → explicit file → env vars
    pub fn load(explicit: Option<&Path>) -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        if let Some(path) = explicit {
            if !path.exists() {
                return Err(ReportError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }
            debug!("Loading config from: {}", path.display());
            figment = figment.merge(Toml::file(path));
        }

        // e.g. DEEPREPORT_LLM__MODEL -> llm.model, DEEPREPORT_REPORT__MAX_WORKERS -> report.max_workers
        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__").lowercase(true));

        let config: Config = figment
            .extract()
            .map_err(|e| ReportError::Config(format!("Configuration error: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file only
    pub fn load_from_file(path: &Path) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
            .extract()
            .map_err(|e| ReportError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/deepreport/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("deepreport"))
    }

    /// Get path to global config file
    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    /// Get path to global cache directory (~/.cache/deepreport/)
    pub fn global_cache_dir() -> Option<PathBuf> {
        env::var("XDG_CACHE_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".cache"))
            })
            .map(|p| p.join("deepreport"))
    }

    /// Get path to project config file
    pub fn project_config_path() -> PathBuf {
        PathBuf::from(".deepreport/config.toml")
    }

    /// Durable cache directory for a loaded configuration
    pub fn cache_dir(config: &Config) -> PathBuf {
        config
            .cache
            .dir
            .clone()
            .or_else(Self::global_cache_dir)
            .unwrap_or_else(|| config.output.data_dir.join("cache"))
    }

    // =========================================================================
    // Config Commands
    // =========================================================================

    /// Show config file paths
    pub fn show_path(config: &Config) {
        println!("Configuration paths:");
        println!();

        if let Some(global) = Self::global_config_path() {
            let exists = if global.exists() { "✓" } else { "✗" };
            println!("  Global:  {} {}", exists, global.display());
        } else {
            println!("  Global:  (not available)");
        }

        let project = Self::project_config_path();
        let exists = if project.exists() { "✓" } else { "✗" };
        println!("  Project: {} {}", exists, project.display());

        let cache = Self::cache_dir(config);
        let exists = if cache.exists() { "✓" } else { "✗" };
        println!("  Cache:   {} {}", exists, cache.display());
    }

    /// Render the effective configuration
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| ReportError::Config(e.to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[llm]
model = "gemini-1.5-pro-latest"
temperature = 0.2

[report]
max_workers = 2
parallel_processing = false
"#,
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.llm.model, "gemini-1.5-pro-latest");
        assert!((config.llm.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(config.report.max_workers, 2);
        assert!(!config.report.parallel_processing);
        // Untouched sections keep their defaults
        assert_eq!(config.search.max_results, 3);
    }

    #[test]
    fn test_load_from_file_rejects_invalid() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[retry]\nmax_attempts = 0\n").unwrap();

        assert!(ConfigLoader::load_from_file(&path).is_err());
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let err = ConfigLoader::load(Some(Path::new("/nonexistent/deepreport.toml")));
        assert!(matches!(err, Err(ReportError::Config(_))));
    }

    #[test]
    fn test_env_override() {
        // SAFETY: This test is the only one touching this variable
        unsafe {
            std::env::set_var("DEEPREPORT_SEARCH__MAX_RESULTS", "7");
        }
        let config = ConfigLoader::load(None).unwrap();
        assert_eq!(config.search.max_results, 7);
        unsafe {
            std::env::remove_var("DEEPREPORT_SEARCH__MAX_RESULTS");
        }
    }

    #[test]
    fn test_render_toml_hides_keys() {
        let mut config = Config::default();
        config.llm.api_key = Some("hidden".to_string());
        let rendered = ConfigLoader::render(&config, false).unwrap();
        assert!(rendered.contains("[llm]"));
        assert!(!rendered.contains("hidden"));
    }
}
