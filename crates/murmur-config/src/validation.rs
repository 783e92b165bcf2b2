// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as probability bounds and transport-specific settings.

use crate::diagnostic::ConfigError;
use crate::model::MurmurConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MurmurConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let p = config.reply.response_probability;
    if !(0.0..=1.0).contains(&p) {
        errors.push(ConfigError::Validation {
            message: format!("reply.response_probability must be in [0.0, 1.0], got {p}"),
        });
    }

    if config.reply.min_delay_secs > config.reply.max_delay_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "reply.min_delay_secs ({}) must not exceed reply.max_delay_secs ({})",
                config.reply.min_delay_secs, config.reply.max_delay_secs
            ),
        });
    }

    match config.mesh.transport.as_str() {
        "tcp" => {
            if config.mesh.host.trim().is_empty() {
                errors.push(ConfigError::Validation {
                    message: "mesh.host must not be empty for the tcp transport".to_string(),
                });
            }
            if config.mesh.port == 0 {
                errors.push(ConfigError::Validation {
                    message: "mesh.port must be nonzero for the tcp transport".to_string(),
                });
            }
        }
        "serial" => {
            if config
                .mesh
                .device
                .as_deref()
                .is_none_or(|d| d.trim().is_empty())
            {
                errors.push(ConfigError::Validation {
                    message: "mesh.device must be set for the serial transport".to_string(),
                });
            }
        }
        other => {
            errors.push(ConfigError::Validation {
                message: format!("mesh.transport must be `tcp` or `serial`, got `{other}`"),
            });
        }
    }

    if config.mesh.backoff_base_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "mesh.backoff_base_secs must be at least 1".to_string(),
        });
    }

    if config.mesh.backoff_max_secs < config.mesh.backoff_base_secs {
        errors.push(ConfigError::Validation {
            message: format!(
                "mesh.backoff_max_secs ({}) must not be below mesh.backoff_base_secs ({})",
                config.mesh.backoff_max_secs, config.mesh.backoff_base_secs
            ),
        });
    }

    if !matches!(config.gateway.provider.as_str(), "openai" | "gemini") {
        errors.push(ConfigError::Validation {
            message: format!(
                "gateway.provider must be `openai` or `gemini`, got `{}`",
                config.gateway.provider
            ),
        });
    }

    if config.dispatch.max_payload_bytes == 0 {
        errors.push(ConfigError::Validation {
            message: "dispatch.max_payload_bytes must be nonzero".to_string(),
        });
    }

    if config.context.recent_to_keep == 0 {
        errors.push(ConfigError::Validation {
            message: "context.recent_to_keep must be at least 1".to_string(),
        });
    }

    if config.context.max_history_messages < config.context.recent_to_keep {
        errors.push(ConfigError::Validation {
            message: format!(
                "context.max_history_messages ({}) must not be below context.recent_to_keep ({})",
                config.context.max_history_messages, config.context.recent_to_keep
            ),
        });
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
    fn default_config_is_valid() {
        let config = MurmurConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn probability_out_of_range_rejected() {
        let mut config = MurmurConfig::default();
        config.reply.response_probability = 1.5;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| e.to_string().contains("response_probability")));
    }

    #[test]
    fn inverted_delay_bounds_rejected() {
        let mut config = MurmurConfig::default();
        config.reply.min_delay_secs = 10;
        config.reply.max_delay_secs = 2;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("min_delay_secs")));
    }

    #[test]
    fn serial_requires_device() {
        let mut config = MurmurConfig::default();
        config.mesh.transport = "serial".to_string();
        config.mesh.device = None;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.iter().any(|e| e.to_string().contains("mesh.device")));
    }

    #[test]
    fn unknown_transport_rejected() {
        let mut config = MurmurConfig::default();
        config.mesh.transport = "carrier-pigeon".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn unknown_provider_rejected() {
        let mut config = MurmurConfig::default();
        config.gateway.provider = "hal9000".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn zero_payload_budget_rejected() {
        let mut config = MurmurConfig::default();
        config.dispatch.max_payload_bytes = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn all_errors_collected() {
        let mut config = MurmurConfig::default();
        config.reply.response_probability = -0.1;
        config.gateway.provider = "nope".to_string();
        config.dispatch.max_payload_bytes = 0;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
