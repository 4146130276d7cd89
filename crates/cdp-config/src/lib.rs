//! cdp-config: configuration, paths and log-file helpers for cdp-debug.
pub mod config;
pub mod error;
pub mod load;
pub mod logging;
pub mod merge;
pub mod paths;
pub mod validate;

pub use config::{
    Config, DiscoveryConfig, LauncherConfig, LogConfig, LogLevel, RuntimeKind, SessionConfig,
};
pub use error::ConfigError;
pub use load::{load_config, load_file, load_from_str};
pub use paths::AppPaths;
