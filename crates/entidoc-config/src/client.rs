//! Client configuration
//!
//! Settings consumed by entity-store handles and the document/chat glue.

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// Maximum number of mutations the store accepts in a single commit
pub const MAX_WRITE_BATCH_SIZE: usize = 500;

/// Kind used for chat history entities when none is configured
pub const DEFAULT_CHAT_HISTORY_KIND: &str = "ChatHistory";

/// Immutable configuration for an entity-store client
///
/// Every field has a default, so a partial TOML file is valid:
///
/// ```toml
/// project_id = "my-project"
/// namespace = "docs"
/// write_batch_size = 200
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Project the store belongs to
    pub project_id: Option<String>,
    /// Namespace partition for keys and queries
    pub namespace: Option<String>,
    /// Named database within the project
    pub database: Option<String>,
    /// Identification string sent with every request
    pub user_agent: Option<String>,
    /// Number of mutations grouped into one commit
    pub write_batch_size: usize,
    /// Kind used for chat history entities
    pub chat_history_kind: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            project_id: None,
            namespace: None,
            database: None,
            user_agent: None,
            write_batch_size: MAX_WRITE_BATCH_SIZE,
            chat_history_kind: DEFAULT_CHAT_HISTORY_KIND.to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the project id
    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    /// Set the namespace
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Set the write batch size
    pub fn with_write_batch_size(mut self, size: usize) -> Self {
        self.write_batch_size = size;
        self
    }

    /// Derive a configuration identifying an additional component
    ///
    /// An unset agent is replaced; an agent already containing `agent` is
    /// kept as is; otherwise `agent` is appended after a single space.
    pub fn with_user_agent(&self, agent: &str) -> Self {
        let user_agent = match self.user_agent.as_deref() {
            None | Some("") => agent.to_string(),
            Some(current) if current.contains(agent) => current.to_string(),
            Some(current) => format!("{} {}", current, agent),
        };

        Self {
            user_agent: Some(user_agent),
            ..self.clone()
        }
    }

    /// Check that every field holds a usable value
    pub fn validate(&self) -> ConfigResult<()> {
        if self.write_batch_size == 0 || self.write_batch_size > MAX_WRITE_BATCH_SIZE {
            return Err(ConfigError::InvalidValue {
                field: "write_batch_size".to_string(),
                value: format!(
                    "{} (must be between 1 and {})",
                    self.write_batch_size, MAX_WRITE_BATCH_SIZE
                ),
            });
        }

        if self.chat_history_kind.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "chat_history_kind".to_string(),
                value: "empty kind".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ClientConfig::default();
        assert_eq!(config.write_batch_size, 500);
        assert_eq!(config.chat_history_kind, "ChatHistory");
        assert!(config.user_agent.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_user_agent_set_when_missing() {
        let config = ClientConfig::default().with_user_agent("entidoc:document_loader/0.1.0");
        assert_eq!(
            config.user_agent.as_deref(),
            Some("entidoc:document_loader/0.1.0")
        );
    }

    #[test]
    fn test_user_agent_appended() {
        let base = ClientConfig {
            user_agent: Some("my-app/2.0".to_string()),
            ..Default::default()
        };
        let config = base.with_user_agent("entidoc:document_saver/0.1.0");
        assert_eq!(
            config.user_agent.as_deref(),
            Some("my-app/2.0 entidoc:document_saver/0.1.0")
        );
        // receiver is left untouched
        assert_eq!(base.user_agent.as_deref(), Some("my-app/2.0"));
    }

    #[test]
    fn test_user_agent_not_duplicated() {
        let config = ClientConfig::default()
            .with_user_agent("entidoc:document_loader/0.1.0")
            .with_user_agent("entidoc:document_loader/0.1.0");
        assert_eq!(
            config.user_agent.as_deref(),
            Some("entidoc:document_loader/0.1.0")
        );
    }

    #[test]
    fn test_validate_rejects_batch_size() {
        let zero = ClientConfig::default().with_write_batch_size(0);
        assert!(matches!(
            zero.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "write_batch_size"
        ));

        let too_large = ClientConfig::default().with_write_batch_size(501);
        assert!(too_large.validate().is_err());

        let ok = ClientConfig::default().with_write_batch_size(1);
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_chat_kind() {
        let config = ClientConfig {
            chat_history_kind: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
