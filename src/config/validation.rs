use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_upstream(config)?;
    validate_log_level(config)?;
    validate_reasoning(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.http_pool_max_idle_per_host == 0 {
        return Err(validation_err(
            "server.http_pool_max_idle_per_host must be greater than 0",
        ));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    Ok(())
}

fn validate_upstream(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    if !upstream.base_url.starts_with("http://") && !upstream.base_url.starts_with("https://") {
        return Err(validation_err(
            "upstream.base_url must start with http:// or https://",
        ));
    }
    if url::Url::parse(&upstream.base_url).is_err() {
        return Err(validation_err("upstream.base_url is not a valid URL"));
    }
    for (alias, model) in &upstream.model_aliases {
        if alias.trim().is_empty() || model.trim().is_empty() {
            return Err(validation_err(format!(
                "Invalid model alias '{alias}' -> '{model}'. Both parts must not be empty."
            )));
        }
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

fn validate_reasoning(config: &AppConfig) -> Result<(), ConfigError> {
    let reasoning = &config.reasoning;
    if reasoning.think_open_tag.trim().is_empty() || reasoning.think_close_tag.trim().is_empty() {
        return Err(validation_err(
            "reasoning.think_open_tag and reasoning.think_close_tag cannot be empty",
        ));
    }
    for pattern in &reasoning.display_models {
        if pattern.trim().is_empty() {
            return Err(validation_err(
                "reasoning.display_models contains an empty pattern",
            ));
        }
    }
    validate_fragment("reasoning.request_overrides", &reasoning.request_overrides)?;
    validate_fragment("reasoning.extra_body", &reasoning.extra_body)?;
    for (model, fragment) in &reasoning.model_request_overrides {
        validate_fragment(&format!("reasoning.model_request_overrides.{model}"), fragment)?;
    }
    for (model, fragment) in &reasoning.model_extra_body {
        validate_fragment(&format!("reasoning.model_extra_body.{model}"), fragment)?;
    }
    Ok(())
}

fn validate_fragment(name: &str, fragment: &serde_json::Value) -> Result<(), ConfigError> {
    if fragment.is_null() || fragment.is_object() {
        return Ok(());
    }
    Err(validation_err(format!("{name} must be a mapping when set")))
}
