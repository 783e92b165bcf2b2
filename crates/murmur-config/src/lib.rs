// SPDX-FileCopyrightText: 2026 Murmur Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Murmur mesh bridge.
//!
//! Layered TOML configuration via Figment (XDG hierarchy + env overrides),
//! post-deserialization validation, and miette-rendered diagnostics.

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::MurmurConfig;
pub use validation::validate_config;

/// Load configuration from the standard hierarchy and validate it.
///
/// Returns the validated config, or all collected errors (parse and
/// validation alike) for rendering via [`render_errors`].
pub fn load_and_validate() -> Result<MurmurConfig, Vec<ConfigError>> {
    let config = loader::load_config().map_err(diagnostic::figment_to_config_errors)?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Load configuration from an explicit file path and validate it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<MurmurConfig, Vec<ConfigError>> {
    let config =
        loader::load_config_from_path(path).map_err(diagnostic::figment_to_config_errors)?;
    validation::validate_config(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        let config = loader::load_config_from_str("").unwrap();
        assert!(validate_config(&config).is_ok());
        assert_eq!(config.bridge.name, "murmur");
        assert_eq!(config.mesh.port, 4403);
    }

    #[test]
    fn toml_overrides_defaults() {
        let config = loader::load_config_from_str(
            r#"
            [reply]
            response_probability = 0.5
            cooldown_secs = 120

            [mesh]
            transport = "serial"
            device = "/dev/ttyUSB0"
            "#,
        )
        .unwrap();
        assert_eq!(config.reply.response_probability, 0.5);
        assert_eq!(config.reply.cooldown_secs, 120);
        assert_eq!(config.mesh.transport, "serial");
        assert_eq!(config.mesh.device.as_deref(), Some("/dev/ttyUSB0"));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn unknown_key_is_rejected() {
        let result = loader::load_config_from_str(
            r#"
            [reply]
            respons_probability = 0.5
            "#,
        );
        assert!(result.is_err());
        let errors = diagnostic::figment_to_config_errors(result.unwrap_err());
        assert!(!errors.is_empty());
        let rendered = errors[0].to_string();
        assert!(rendered.contains("respons_probability"), "got: {rendered}");
    }
}
