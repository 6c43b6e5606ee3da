//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;
pub use validation::parse_timezone;

use crate::error::Result;
use chrono::FixedOffset;
use std::path::Path;

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// The default-timezone offset applied to zone-less timestamps.
    pub fn default_offset(&self) -> Result<FixedOffset> {
        parse_timezone(&self.conversion.default_timezone)
    }
}
