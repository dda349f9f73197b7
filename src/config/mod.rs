//! Configuration module.

mod loader;
mod types;

pub use loader::{ConfigError, ConfigLoader};
pub use types::{
    AdminConfig, DatabaseConfig, ExclusionRules, LedgerConfig, PerformanceConfig,
};
