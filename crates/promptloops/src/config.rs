//! Project configuration file support for promptloops.
//!
//! Loads configuration from `promptloops.toml` in the working directory.

use anyhow::{Context, Result};
use promptloops_client::{ClientConfig, DEFAULT_MODEL};
use promptloops_core::ModelSelection;
use serde::Deserialize;
use std::path::Path;

/// Project-level configuration loaded from `promptloops.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Global default model (applies to both generator and validator)
    pub model: Option<String>,
    /// Chat-completion endpoint override
    pub endpoint: Option<String>,
    /// Sent as `HTTP-Referer`
    pub referer: Option<String>,
    /// Sent as `X-Title`
    pub title: Option<String>,
    /// Generator-specific configuration
    #[serde(default)]
    pub generator: RoleConfig,
    /// Validator-specific configuration
    #[serde(default)]
    pub validator: RoleConfig,
}

/// Configuration for a specific role (generator or validator)
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    /// Model to use for this role
    pub model: Option<String>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "promptloops.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Get the effective model for the generator role.
    /// Priority: [generator].model > global model > None
    pub fn generator_model(&self) -> Option<&str> {
        self.generator.model.as_deref().or(self.model.as_deref())
    }

    /// Get the effective model for the validator role.
    /// Priority: [validator].model > global model > None
    pub fn validator_model(&self) -> Option<&str> {
        self.validator.model.as_deref().or(self.model.as_deref())
    }

    /// Models after applying command-line overrides.
    /// Priority: role flag > global flag > config file > built-in default
    pub fn models(
        &self,
        model: Option<&str>,
        generator_model: Option<&str>,
        validator_model: Option<&str>,
    ) -> ModelSelection {
        let generator = generator_model
            .or(model)
            .or(self.generator_model())
            .unwrap_or(DEFAULT_MODEL);
        let validator = validator_model
            .or(model)
            .or(self.validator_model())
            .unwrap_or(DEFAULT_MODEL);
        ModelSelection {
            generator: generator.to_string(),
            validator: validator.to_string(),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(endpoint) = &self.endpoint {
            config = config.with_endpoint(endpoint);
        }
        if let Some(referer) = &self.referer {
            config = config.with_referer(referer);
        }
        if let Some(title) = &self.title {
            config = config.with_title(title);
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir, content: &str) {
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_missing_file_is_none() {
        let dir = TempDir::new().unwrap();
        assert!(ProjectConfig::load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_role_overrides_global() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
model = "openai/gpt-4o-mini"

[validator]
model = "anthropic/claude-3.5-sonnet"
"#,
        );

        let config = ProjectConfig::load(dir.path()).unwrap().unwrap();
        assert_eq!(config.generator_model(), Some("openai/gpt-4o-mini"));
        assert_eq!(
            config.validator_model(),
            Some("anthropic/claude-3.5-sonnet")
        );
    }

    #[test]
    fn test_flags_override_config() {
        let config = ProjectConfig {
            model: Some("from-file".to_string()),
            ..Default::default()
        };

        let models = config.models(None, Some("gen-flag"), None);
        assert_eq!(models.generator, "gen-flag");
        assert_eq!(models.validator, "from-file");

        let models = config.models(Some("global-flag"), None, None);
        assert_eq!(models.generator, "global-flag");
        assert_eq!(models.validator, "global-flag");

        let models = ProjectConfig::default().models(None, None, None);
        assert_eq!(models, ModelSelection::default());
    }

    #[test]
    fn test_unknown_field_is_error() {
        let dir = TempDir::new().unwrap();
        write_config(&dir, "temperature = 0.2\n");
        assert!(ProjectConfig::load(dir.path()).is_err());
    }

    #[test]
    fn test_client_settings() {
        let dir = TempDir::new().unwrap();
        write_config(
            &dir,
            r#"
endpoint = "http://localhost:9000/v1/chat/completions"
title = "My Prompts"
"#,
        );

        let client = ProjectConfig::load(dir.path())
            .unwrap()
            .unwrap()
            .client_config();
        assert_eq!(client.endpoint, "http://localhost:9000/v1/chat/completions");
        assert_eq!(client.title, "My Prompts");
    }
}
