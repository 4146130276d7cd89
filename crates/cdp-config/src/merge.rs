//! Layering of a project config over the global one.

use crate::config::Config;
use crate::error::ConfigError;

/// Apply the TOML text `overlay` on top of `base`.
///
/// Keys the overlay leaves out keep their `base` value. Nested tables such
/// as `[launcher.env]` merge key by key; arrays like `enable_domains` are
/// replaced whole.
pub fn merge_configs(base: &Config, overlay: &str) -> Result<Config, ConfigError> {
    let mut layered: toml::Table = toml::to_string(base)
        .map_err(parse_error)
        .and_then(|text| toml::from_str(&text).map_err(parse_error))?;
    let overlay: toml::Table = toml::from_str(overlay).map_err(parse_error)?;
    overlay_table(&mut layered, overlay);
    toml::Value::Table(layered).try_into().map_err(parse_error)
}

fn parse_error(e: impl std::fmt::Display) -> ConfigError {
    ConfigError::Parse(e.to_string())
}

fn overlay_table(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(nested) => match base.get_mut(&key) {
                Some(toml::Value::Table(inner)) => overlay_table(inner, nested),
                _ => {
                    base.insert(key, toml::Value::Table(nested));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeKind;

    #[test]
    fn merge_empty_overlay_returns_base() {
        let base = Config::default();
        let merged = merge_configs(&base, "").expect("merge empty");
        assert_eq!(merged, base);
    }

    #[test]
    fn merge_overrides_port() {
        let base = Config::default();
        let overlay = "[launcher]\nport = 9333\n";
        let merged = merge_configs(&base, overlay).expect("merge");
        assert_eq!(merged.launcher.port, 9333);
        assert_eq!(merged.launcher.host, "127.0.0.1");
        assert_eq!(merged.launcher.runtime, RuntimeKind::Node);
    }

    #[test]
    fn merge_replaces_arrays_wholesale() {
        let base = Config::default();
        let overlay = "[session]\nenable_domains = [\"Debugger\"]\n";
        let merged = merge_configs(&base, overlay).expect("merge");
        assert_eq!(merged.session.enable_domains, vec!["Debugger"]);
    }

    #[test]
    fn merge_adds_missing_field() {
        let base = Config::default();
        assert!(base.launcher.program.is_none());
        let overlay = "[launcher]\nprogram = \"dist/index.js\"\n";
        let merged = merge_configs(&base, overlay).expect("merge");
        assert_eq!(merged.launcher.program.as_deref(), Some("dist/index.js"));
    }

    #[test]
    fn merge_env_tables_key_by_key() {
        let base = merge_configs(&Config::default(), "[launcher.env]\nA = \"1\"\n").unwrap();
        let merged = merge_configs(&base, "[launcher.env]\nB = \"2\"\n").unwrap();
        assert_eq!(merged.launcher.env.get("A").map(String::as_str), Some("1"));
        assert_eq!(merged.launcher.env.get("B").map(String::as_str), Some("2"));
    }

    #[test]
    fn merge_invalid_overlay_returns_parse_error() {
        let base = Config::default();
        let result = merge_configs(&base, "{{invalid}}");
        assert!(result.is_err());
    }

    #[test]
    fn merge_preserves_unrelated_sections() {
        let base = Config::default();
        let overlay = "[discovery]\nmax_attempts = 2\n";
        let merged = merge_configs(&base, overlay).expect("merge");
        assert_eq!(merged.launcher, base.launcher);
        assert_eq!(merged.session, base.session);
        assert_eq!(merged.log, base.log);
    }
}
