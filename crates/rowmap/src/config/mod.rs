//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use crate::error::{MigrateError, Result};
use std::path::Path;

/// Connection settings given on the command line; each one overrides the file.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub source_database: Option<String>,
    pub target_database: Option<String>,
}

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

    /// Apply command-line overrides to the connection section.
    pub fn with_overrides(mut self, overrides: ConnectionOverrides) -> Self {
        let conn = &mut self.connection;
        if let Some(host) = overrides.host {
            conn.host = host;
        }
        if let Some(port) = overrides.port {
            conn.port = port;
        }
        if let Some(user) = overrides.user {
            conn.user = user;
        }
        if let Some(password) = overrides.password {
            conn.password = password;
        }
        if overrides.source_database.is_some() {
            conn.source_database = overrides.source_database;
        }
        if overrides.target_database.is_some() {
            conn.target_database = overrides.target_database;
        }
        self
    }

    /// Source and target database names, required before connecting.
    pub fn databases(&self) -> Result<(&str, &str)> {
        let source = self
            .connection
            .source_database
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                MigrateError::Config(
                    "source database is required (--src or connection.source_database)".into(),
                )
            })?;
        let target = self
            .connection
            .target_database
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                MigrateError::Config(
                    "target database is required (--dst or connection.target_database)".into(),
                )
            })?;
        Ok((source, target))
    }
}
