use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - slskd URL is an http(s) URL
/// - Search timing and size bounds are consistent
/// - Reputation thresholds, selection cap, monitor interval and wishlist
///   concurrency are non-zero
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let url = config.slskd.url.trim();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "slskd.url must start with http:// or https:// (got '{}')",
            config.slskd.url
        )));
    }

    config
        .search
        .validate()
        .map_err(ConfigError::ValidationError)?;

    if config.reputation.auto_trust_threshold == 0 {
        return Err(ConfigError::ValidationError(
            "reputation.auto_trust_threshold cannot be 0".to_string(),
        ));
    }
    if config.reputation.auto_flag_threshold == 0 {
        return Err(ConfigError::ValidationError(
            "reputation.auto_flag_threshold cannot be 0".to_string(),
        ));
    }

    if config.selection.max_candidates == 0 {
        return Err(ConfigError::ValidationError(
            "selection.max_candidates cannot be 0".to_string(),
        ));
    }
    if config.selection.sweep_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "selection.sweep_interval_secs cannot be 0".to_string(),
        ));
    }

    if config.monitor.poll_interval_secs == 0 {
        return Err(ConfigError::ValidationError(
            "monitor.poll_interval_secs cannot be 0".to_string(),
        ));
    }

    if let Some(wishlist) = &config.wishlist {
        if wishlist.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "wishlist.concurrency cannot be 0".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    fn config(extra: &str) -> Config {
        let toml = format!(
            r#"
[slskd]
url = "http://localhost:5030"
{}
"#,
            extra
        );
        load_config_from_str(&toml).unwrap()
    }

    #[test]
    fn test_validate_valid_config() {
        assert!(validate_config(&config("")).is_ok());
    }

    #[test]
    fn test_validate_bad_url_fails() {
        let mut config = config("");
        config.slskd.url = "localhost:5030".to_string();
        let result = validate_config(&config);
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_validate_search_timeout_above_ceiling_fails() {
        let config = config(
            r#"
[search]
search_timeout_ms = 30000
max_wait_ms = 20000
"#,
        );
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("search_timeout_ms"));
    }

    #[test]
    fn test_validate_zero_threshold_fails() {
        let config = config(
            r#"
[reputation]
auto_flag_threshold = 0
"#,
        );
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_zero_concurrency_fails() {
        let config = config(
            r#"
[wishlist]
path = "wishlist.toml"
concurrency = 0
"#,
        );
        assert!(validate_config(&config).is_err());
    }
}
