//! Configuration: JSON file at `~/.wsl-port-forward.json` plus CLI overrides.

pub mod error;
pub mod loader;
pub mod schema;

pub use error::ConfigError;
pub use loader::{detect_wsl_ip, ConfigLoader, CONFIG_FILE_NAME};
pub use schema::Config;
