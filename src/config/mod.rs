//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/deepreport/config.toml)
//! 3. Project config (.deepreport/config.toml)
//! 4. Explicit config file (--config)
//! 5. Environment variables (DEEPREPORT_*)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
