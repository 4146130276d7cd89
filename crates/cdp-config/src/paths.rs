use std::path::PathBuf;

use crate::error::ConfigError;

const APP_DIR: &str = "cdp-debug";

/// Standard per-user directories for the debugger.
#[derive(Debug, Clone)]
pub struct AppPaths {
    home: PathBuf,
}

impl AppPaths {
    /// Resolve the home directory via `dirs`, falling back to `$HOME`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Path` if the home directory cannot be
    /// determined.
    pub fn new() -> Result<Self, ConfigError> {
        let home = dirs::home_dir()
            .or_else(|| std::env::var("HOME").ok().map(PathBuf::from))
            .ok_or_else(|| ConfigError::Path("could not determine home directory".into()))?;
        Ok(Self { home })
    }

    /// Build paths rooted at an explicit home directory.
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        Self { home: home.into() }
    }

    /// `~/.config/cdp-debug`
    pub fn config_dir(&self) -> PathBuf {
        self.home.join(".config").join(APP_DIR)
    }

    /// `~/.local/share/cdp-debug`
    pub fn data_dir(&self) -> PathBuf {
        self.home.join(".local").join("share").join(APP_DIR)
    }

    /// `<data_dir>/logs`
    pub fn log_dir(&self) -> PathBuf {
        self.data_dir().join("logs")
    }

    /// Default log file inside [`log_dir`](Self::log_dir).
    pub fn default_log_file(&self) -> PathBuf {
        self.log_dir().join("cdp-debug.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_dir_ends_with_app_name() {
        let paths = AppPaths::with_home("/home/dev");
        assert_eq!(
            paths.config_dir(),
            PathBuf::from("/home/dev/.config/cdp-debug")
        );
    }

    #[test]
    fn log_dir_is_under_data_dir() {
        let paths = AppPaths::with_home("/home/dev");
        assert!(paths.log_dir().starts_with(paths.data_dir()));
        assert!(paths.default_log_file().ends_with("logs/cdp-debug.log"));
    }

    #[test]
    fn new_resolves_some_home() {
        let paths = AppPaths::new().expect("should resolve home directory");
        assert!(paths.config_dir().ends_with(".config/cdp-debug"));
    }
}
