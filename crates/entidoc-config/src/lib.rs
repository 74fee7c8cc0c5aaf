//! # Entidoc Configuration
//!
//! Immutable client configuration shared by every entity-store collaborator.
//!
//! A [`ClientConfig`] is built once (defaults, a TOML file, environment
//! overrides) and handed to store handles at construction time. Components
//! that need to identify themselves derive a new value with
//! [`ClientConfig::with_user_agent`] instead of mutating shared state.
//!
//! ```rust,no_run
//! use entidoc_config::ClientConfig;
//!
//! # async fn example() -> Result<(), entidoc_config::ConfigError> {
//! let config = ClientConfig::load_from_file("entidoc.toml")
//!     .await?
//!     .with_env_overrides()?;
//! let loader_config = config.with_user_agent("entidoc:document_loader/0.1.0");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod client;
mod error;
mod loader;

pub use client::*;
pub use error::*;
pub use loader::*;
