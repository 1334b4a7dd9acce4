//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → mpsc → HttpServer::run swaps runtime settings and pushes endpoints
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Listener and body-limit changes need a restart; everything else is live

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, BackendConfig, GatewayConfig, JournalConfig, ListenerConfig, LogFormat,
    ObservabilityConfig, TimeoutConfig, TransferConfig,
};
pub use watcher::ConfigWatcher;
