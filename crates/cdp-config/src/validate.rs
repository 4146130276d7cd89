use crate::config::Config;
use crate::error::ConfigError;

/// Validate a [`Config`], returning all detected violations.
///
/// Returns `Ok(())` when the config is valid, or `Err` with a
/// vector of every validation error found.
pub fn validate(config: &Config) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.launcher.port == 0 {
        errors.push(ConfigError::Validation {
            field: "launcher.port".to_string(),
            message: "must not be 0".to_string(),
        });
    }

    if config.launcher.host.trim().is_empty() {
        errors.push(ConfigError::Validation {
            field: "launcher.host".to_string(),
            message: "must not be empty".to_string(),
        });
    }

    if config.discovery.max_attempts == 0 {
        errors.push(ConfigError::Validation {
            field: "discovery.max_attempts".to_string(),
            message: "must be at least 1".to_string(),
        });
    }

    if config.discovery.request_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            field: "discovery.request_timeout_ms".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }

    if config.session.enable_domains.is_empty() {
        errors.push(ConfigError::Validation {
            field: "session.enable_domains".to_string(),
            message: "must name at least one domain".to_string(),
        });
    }

    if config.session.source_map_timeout_ms == 0 {
        errors.push(ConfigError::Validation {
            field: "session.source_map_timeout_ms".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }

    if config.session.command_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            field: "session.command_timeout_secs".to_string(),
            message: "must be greater than 0".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
