use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::ConfigError;
use crate::merge::merge_configs;
use crate::validate::validate;

/// Name of the per-project directory holding an override file.
pub const PROJECT_DIR_NAME: &str = ".cdp-debug";

/// Content written into a newly-created default config file.
const DEFAULT_CONFIG_CONTENT: &str = r#"# cdp-debug configuration
# Uncomment and edit settings below to override defaults.

# [launcher]
# runtime = "node"          # node | chrome | custom
# program = "index.js"
# host = "127.0.0.1"
# port = 9229

# [discovery]
# initial_delay_ms = 500
# retry_delay_ms = 500
# max_attempts = 10

# [session]
# enable_domains = ["Runtime", "Debugger"]
# source_map_timeout_ms = 5000
# command_timeout_secs = 30

# [log]
# level = "info"
"#;

/// Load and merge configuration.
///
/// 1. Reads the global config from `config_dir/config.toml`.
///    If the file does not exist it is created with commented-out
///    defaults.
/// 2. Optionally reads a project config from
///    `project_dir/.cdp-debug/config.toml` (walks upward).
/// 3. Merges: `Config::default() <- global <- project`.
/// 4. Validates the merged result.
///
/// # Errors
///
/// Returns [`ConfigError`] on I/O failure, parse failure, or
/// validation failure.
pub fn load_config(config_dir: &Path, project_dir: Option<&Path>) -> Result<Config, ConfigError> {
    let global_path = config_dir.join("config.toml");

    if !config_dir.exists() {
        std::fs::create_dir_all(config_dir)?;
    }

    if !global_path.exists() {
        std::fs::write(&global_path, DEFAULT_CONFIG_CONTENT)
            .map_err(|e| ConfigError::CreateDefault(e.to_string()))?;
        tracing::info!("Created default config at {}", global_path.display());
    }

    let mut config = Config::default();

    let global_content = std::fs::read_to_string(&global_path)?;
    if has_non_comment_content(&global_content) {
        config = merge_configs(&config, &global_content)?;
    }

    if let Some(proj) = project_dir {
        if let Some(project_path) = find_project_config(proj) {
            tracing::debug!("Merging project config {}", project_path.display());
            let project_content = std::fs::read_to_string(&project_path)?;
            config = merge_configs(&config, &project_content)?;
        }
    }

    validate(&config).map_err(first_violation)?;

    Ok(config)
}

/// Walk from `start` upward looking for `.cdp-debug/config.toml`.
fn find_project_config(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_path_buf();
    loop {
        let candidate = dir.join(PROJECT_DIR_NAME).join("config.toml");
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            return None;
        }
    }
}

/// Returns `true` when the content has at least one
/// non-empty, non-comment line.
fn has_non_comment_content(content: &str) -> bool {
    content.lines().any(|l| {
        let trimmed = l.trim();
        !trimmed.is_empty() && !trimmed.starts_with('#')
    })
}

fn first_violation(errors: Vec<ConfigError>) -> ConfigError {
    errors
        .into_iter()
        .next()
        .unwrap_or_else(|| ConfigError::Validation {
            field: "unknown".to_string(),
            message: "validation failed".to_string(),
        })
}

/// Parse a TOML string directly into a validated [`Config`].
///
/// # Errors
///
/// Returns [`ConfigError`] on parse or validation failure.
pub fn load_from_str(toml_str: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(toml_str).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate(&config).map_err(first_violation)?;
    Ok(config)
}

/// Read one explicit config file (the `--config` flag) and validate it.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] when `path` does not exist.
pub fn load_file(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let config = merge_configs(&Config::default(), &content)?;
    validate(&config).map_err(first_violation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_config_creates_default_when_missing() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");

        let config = load_config(&cfg_dir, None).unwrap();
        assert_eq!(config, Config::default());
        assert!(cfg_dir.join("config.toml").exists());
    }

    #[test]
    fn load_config_reads_existing_global() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[launcher]\nport = 9300\n").unwrap();

        let config = load_config(&cfg_dir, None).unwrap();
        assert_eq!(config.launcher.port, 9300);
        assert_eq!(config.launcher.host, "127.0.0.1");
    }

    #[test]
    fn load_config_merges_project_over_global() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[launcher]\nport = 9300\n").unwrap();

        let proj_dir = tmp.path().join("project");
        let local = proj_dir.join(PROJECT_DIR_NAME);
        std::fs::create_dir_all(&local).unwrap();
        std::fs::write(local.join("config.toml"), "[launcher]\nport = 9400\n").unwrap();

        let config = load_config(&cfg_dir, Some(&proj_dir)).unwrap();
        assert_eq!(config.launcher.port, 9400);
    }

    #[test]
    fn load_config_rejects_invalid_global() {
        let tmp = TempDir::new().unwrap();
        let cfg_dir = tmp.path().join("config");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), "[discovery]\nmax_attempts = 0\n").unwrap();

        let err = load_config(&cfg_dir, None).unwrap_err();
        assert!(matches!(err, ConfigError::Validation { .. }));
    }

    #[test]
    fn load_from_str_parses_valid_toml() {
        let config = load_from_str("[launcher]\nruntime = \"custom\"\n").unwrap();
        assert_eq!(config.launcher.runtime, crate::config::RuntimeKind::Custom);
    }

    #[test]
    fn load_from_str_rejects_invalid_toml() {
        assert!(load_from_str("{{bad}}").is_err());
    }

    #[test]
    fn load_from_str_rejects_invalid_values() {
        assert!(load_from_str("[launcher]\nport = 0\n").is_err());
    }

    #[test]
    fn load_file_missing_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = load_file(&tmp.path().join("nope.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn load_file_reads_partial_config() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("debug.toml");
        std::fs::write(&path, "[session]\nrun_if_waiting_for_debugger = false\n").unwrap();
        let config = load_file(&path).unwrap();
        assert!(!config.session.run_if_waiting_for_debugger);
        assert_eq!(config.discovery, Config::default().discovery);
    }

    #[test]
    fn find_project_config_walks_up() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("repo");
        let local = root.join(PROJECT_DIR_NAME);
        std::fs::create_dir_all(&local).unwrap();
        std::fs::write(local.join("config.toml"), "[launcher]\nport = 9229\n").unwrap();

        let deep = root.join("src").join("module");
        std::fs::create_dir_all(&deep).unwrap();

        let found = find_project_config(&deep);
        assert!(found.is_some());
        assert!(found.unwrap().ends_with(".cdp-debug/config.toml"));
    }

    #[test]
    fn default_config_content_is_comment_only() {
        assert!(!has_non_comment_content(DEFAULT_CONFIG_CONTENT));
    }

    #[test]
    fn has_non_comment_content_detects_values() {
        assert!(!has_non_comment_content(""));
        assert!(!has_non_comment_content("# comment\n"));
        assert!(has_non_comment_content("# comment\nport = 4\n"));
    }
}
