//! Config Command
//!
//! Usage:
//!   deepreport config show [--json]
//!   deepreport config path

use crate::config::{Config, ConfigLoader};
use crate::types::Result;

/// Print the effective configuration (merged from all sources)
pub fn show(config: &Config, as_json: bool) -> Result<()> {
    println!("{}", ConfigLoader::render(config, as_json)?);
    Ok(())
}

/// Print configuration and cache paths
pub fn path(config: &Config) -> Result<()> {
    ConfigLoader::show_path(config);
    Ok(())
}
