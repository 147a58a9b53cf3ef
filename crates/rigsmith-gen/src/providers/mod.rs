//! Provider registry
//!
//! Maps provider names to concrete implementations.

pub mod gemini;
pub mod mock;

use crate::config::RigConfig;
use crate::provider::GenerationProvider;
use rigsmith_core::{Result, RigError};

/// Create a provider by name with configuration
pub fn create_provider(name: &str, config: &RigConfig) -> Result<Box<dyn GenerationProvider>> {
    if !config.is_enabled(name) {
        return Err(RigError::ConfigError(format!(
            "Provider '{}' is disabled in config",
            name
        )));
    }
    match name {
        "mock" => Ok(Box::new(mock::MockProvider::new())),
        "gemini" => Ok(Box::new(gemini::GeminiProvider::from_config(config)?)),
        _ => Err(RigError::ConfigError(format!(
            "Unknown provider '{}'. Available: {}",
            name,
            available_providers().join(", ")
        ))),
    }
}

/// List all available provider names
pub fn available_providers() -> Vec<&'static str> {
    vec!["mock", "gemini"]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_provider() {
        let config = RigConfig::default();
        assert_eq!(create_provider("mock", &config).unwrap().name(), "mock");
        assert!(matches!(
            create_provider("dalle", &config),
            Err(RigError::ConfigError(_))
        ));
    }

    #[test]
    fn test_disabled_provider() {
        let config: RigConfig = crate::config::RigConfigFile {
            providers: [(
                "mock".to_string(),
                crate::config::ProviderConfig {
                    api_key: None,
                    api_url: None,
                    enabled: false,
                },
            )]
            .into_iter()
            .collect(),
            ..Default::default()
        }
        .into();
        assert!(create_provider("mock", &config).is_err());
    }
}
