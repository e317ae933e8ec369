//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (limits > 0, intervals > 0)
//! - Validate URLs and bind addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: SequencerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;
use thiserror::Error;
use url::Url;

use crate::config::schema::SequencerConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &SequencerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if Url::parse(&config.ledger.rest_url).is_err() {
        errors.push(ValidationError::new("ledger.rest_url", format!("invalid URL '{}'", config.ledger.rest_url)));
    }
    for url in &config.ledger.failover_urls {
        if Url::parse(url).is_err() {
            errors.push(ValidationError::new("ledger.failover_urls", format!("invalid URL '{}'", url)));
        }
    }
    if config.ledger.chain_id.trim().is_empty() {
        errors.push(ValidationError::new("ledger.chain_id", "must not be empty"));
    }
    if config.ledger.request_timeout_secs == 0 {
        errors.push(ValidationError::new("ledger.request_timeout_secs", "must be greater than 0"));
    }
    if config.ledger.commit_poll_interval_ms == 0 {
        errors.push(ValidationError::new("ledger.commit_poll_interval_ms", "must be greater than 0"));
    }

    let pipeline = &config.sequencer;
    if pipeline.inflight_limit == 0 {
        errors.push(ValidationError::new("sequencer.inflight_limit", "must be greater than 0"));
    }
    if pipeline.poll_interval_ms == 0 {
        errors.push(ValidationError::new("sequencer.poll_interval_ms", "must be greater than 0"));
    }
    if pipeline.response_buffer == 0 {
        errors.push(ValidationError::new("sequencer.response_buffer", "must be greater than 0"));
    }
    if pipeline.reset_backoff_base_ms > pipeline.reset_backoff_max_ms {
        errors.push(ValidationError::new(
            "sequencer.reset_backoff_base_ms",
            "must not exceed reset_backoff_max_ms",
        ));
    }
    if let Some(address) = &pipeline.account_address {
        if address.trim().is_empty() {
            errors.push(ValidationError::new("sequencer.account_address", "must not be empty when set"));
        }
    }

    let observability = &config.observability;
    if !["trace", "debug", "info", "warn", "error"].contains(&observability.log_level.as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", observability.log_level),
        ));
    }
    if observability.metrics_enabled && observability.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&SequencerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = SequencerConfig::default();
        config.sequencer.inflight_limit = 0;
        config.sequencer.poll_interval_ms = 0;
        config.ledger.rest_url = "::nope".to_string();
        config.observability.log_level = "loud".to_string();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "ledger.rest_url",
                "sequencer.inflight_limit",
                "sequencer.poll_interval_ms",
                "observability.log_level"
            ]
        );
    }

    #[test]
    fn test_backoff_bounds() {
        let mut config = SequencerConfig::default();
        config.sequencer.reset_backoff_base_ms = 10_000;
        config.sequencer.reset_backoff_max_ms = 100;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("reset_backoff_max_ms"));
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = SequencerConfig::default();
        config.observability.metrics_address = "nowhere".to_string();
        assert!(validate_config(&config).is_ok());

        config.observability.metrics_enabled = true;
        assert!(validate_config(&config).is_err());
    }
}
