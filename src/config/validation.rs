use crate::config::types::{
    Backend, BrowserSettings, Config, FetchConfig, RunConfig, MAX_DELAY_SECS,
};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_run_config(&config.run)?;
    validate_fetch_config(&config.fetch)?;
    validate_browser_settings(&config.fetch, &config.browser)?;
    Ok(())
}

/// Validates the run section
fn validate_run_config(config: &RunConfig) -> Result<(), ConfigError> {
    validate_run_name(&config.name)?;

    if config.checkpoint_every < 1 {
        return Err(ConfigError::Validation(format!(
            "checkpoint-every must be >= 1, got {}",
            config.checkpoint_every
        )));
    }

    if config.main_tags.iter().any(|tag| tag.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "main-tags cannot contain empty category names".to_string(),
        ));
    }

    Ok(())
}

/// Validates fetch behavior settings
fn validate_fetch_config(config: &FetchConfig) -> Result<(), ConfigError> {
    if !config.min_delay.is_finite() || config.min_delay < 0.0 {
        return Err(ConfigError::Validation(format!(
            "min-delay must be a non-negative number, got {}",
            config.min_delay
        )));
    }

    if !config.max_delay.is_finite() || config.max_delay < config.min_delay {
        return Err(ConfigError::Validation(format!(
            "max-delay must be >= min-delay ({}), got {}",
            config.min_delay, config.max_delay
        )));
    }

    if config.max_delay > MAX_DELAY_SECS {
        return Err(ConfigError::Validation(format!(
            "max-delay must be <= {} seconds, got {}",
            MAX_DELAY_SECS, config.max_delay
        )));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates browser settings against the selected backend
fn validate_browser_settings(
    fetch: &FetchConfig,
    browser: &BrowserSettings,
) -> Result<(), ConfigError> {
    if fetch.backend != Backend::Browser {
        return Ok(());
    }

    if !cfg!(feature = "browser") {
        return Err(ConfigError::UnsupportedBackend(fetch.backend.to_string()));
    }

    if browser.timeout_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "browser timeout-ms must be >= 1000, got {}",
            browser.timeout_ms
        )));
    }

    Ok(())
}

/// The run name becomes a file name, so it must not escape the output root
fn validate_run_name(name: &str) -> Result<(), ConfigError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Validation("run name cannot be empty".to_string()));
    }

    if trimmed.contains('/') || trimmed.contains('\\') || trimmed == "." || trimmed == ".." {
        return Err(ConfigError::Validation(format!(
            "run name '{}' cannot contain path separators",
            name
        )));
    }

    Ok(())
}
