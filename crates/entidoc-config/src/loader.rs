//! Loading configuration from TOML and the environment

use std::path::Path;

use tracing::{debug, info};

use crate::client::ClientConfig;
use crate::error::{ConfigError, ConfigResult};

/// Environment variable overriding [`ClientConfig::project_id`]
pub const ENV_PROJECT_ID: &str = "ENTIDOC_PROJECT_ID";
/// Environment variable overriding [`ClientConfig::namespace`]
pub const ENV_NAMESPACE: &str = "ENTIDOC_NAMESPACE";
/// Environment variable overriding [`ClientConfig::database`]
pub const ENV_DATABASE: &str = "ENTIDOC_DATABASE";
/// Environment variable overriding [`ClientConfig::write_batch_size`]
pub const ENV_WRITE_BATCH_SIZE: &str = "ENTIDOC_WRITE_BATCH_SIZE";

impl ClientConfig {
    /// Parse and validate a configuration from TOML text
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: ClientConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML configuration file
    pub async fn load_from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading client configuration");

        let contents = tokio::fs::read_to_string(path).await?;
        let config = Self::from_toml_str(&contents)?;

        info!(
            path = %path.display(),
            project_id = ?config.project_id,
            namespace = ?config.namespace,
            "Loaded client configuration"
        );
        Ok(config)
    }

    /// Default configuration with the process environment applied
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().with_env_overrides()
    }

    /// Apply overrides from the process environment
    pub fn with_env_overrides(self) -> ConfigResult<Self> {
        self.with_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn with_overrides_from<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(project_id) = lookup(ENV_PROJECT_ID) {
            self.project_id = Some(project_id);
        }
        if let Some(namespace) = lookup(ENV_NAMESPACE) {
            self.namespace = Some(namespace);
        }
        if let Some(database) = lookup(ENV_DATABASE) {
            self.database = Some(database);
        }
        if let Some(raw) = lookup(ENV_WRITE_BATCH_SIZE) {
            self.write_batch_size =
                raw.trim()
                    .parse()
                    .map_err(|e| ConfigError::InvalidValue {
                        field: ENV_WRITE_BATCH_SIZE.to_string(),
                        value: format!("{:?}: {}", raw, e),
                    })?;
        }

        self.validate()?;
        Ok(self)
    }
}
