//! Container configuration
//!
//! Configuration can be built in code or loaded from:
//! - TOML, JSON or YAML strings
//! - Files, with the format picked by extension
//! - Environment variables (`IOC_NAME`, `IOC_ERROR_POLICY`,
//!   `IOC_EAGER_SINGLETONS`, `IOC_SKIP_LOG_CAPACITY`), applied on top

use anyhow::{anyhow, bail, Result};
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path};
use tracing::debug;

/// What the convenience registration surface does with a rejected registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Return the error
    #[default]
    Raise,
    /// Log a warning and report `Ok(false)`
    Suppress,
}

impl std::str::FromStr for ErrorPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "raise" => Ok(ErrorPolicy::Raise),
            "suppress" => Ok(ErrorPolicy::Suppress),
            other => Err(anyhow!("unknown error policy: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContainerConfig {
    /// Label of the root container
    pub name: Option<String>,
    pub error_policy: ErrorPolicy,
    /// Build singletons at registration instead of first resolution
    pub eager_singletons: bool,
    /// Number of skipped items kept for diagnostics
    pub skip_log_capacity: usize,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            name: None,
            error_policy: ErrorPolicy::Raise,
            eager_singletons: false,
            skip_log_capacity: 128,
        }
    }
}

impl ContainerConfig {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.skip_log_capacity == 0 {
            bail!("skip_log_capacity must be greater than zero");
        }
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                bail!("container name must not be blank");
            }
        }
        Ok(())
    }
}

/// Loads [`ContainerConfig`] from files, strings and the environment
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env_prefix: String,
    validate_on_load: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            env_prefix: "IOC".to_string(),
            validate_on_load: true,
        }
    }

    pub fn env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    pub fn validate(mut self, enabled: bool) -> Self {
        self.validate_on_load = enabled;
        self
    }

    /// Defaults plus environment overrides
    pub fn load(&self) -> Result<ContainerConfig> {
        self.finish(ContainerConfig::default())
    }

    pub fn load_from_file<P: AsRef<Path>>(&self, path: P) -> Result<ContainerConfig> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;

        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => self.load_from_toml(&content),
            Some("json") => self.load_from_json(&content),
            Some("yaml") | Some("yml") => self.load_from_yaml(&content),
            _ => Err(anyhow!(
                "Unsupported configuration file format: {:?}",
                path.extension()
            )),
        }
    }

    pub fn load_from_toml(&self, content: &str) -> Result<ContainerConfig> {
        let config: ContainerConfig = toml::from_str(content)?;
        self.finish(config)
    }

    pub fn load_from_json(&self, content: &str) -> Result<ContainerConfig> {
        let config: ContainerConfig = serde_json::from_str(content)?;
        self.finish(config)
    }

    pub fn load_from_yaml(&self, content: &str) -> Result<ContainerConfig> {
        let config: ContainerConfig = serde_yaml::from_str(content)?;
        self.finish(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, config: &ContainerConfig, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => toml::to_string_pretty(config)?,
            Some("json") => serde_json::to_string_pretty(config)?,
            Some("yaml") | Some("yml") => serde_yaml::to_string(config)?,
            _ => {
                return Err(anyhow!(
                    "Unsupported file format: {:?}",
                    path.extension()
                ))
            }
        };

        fs::write(path, content)?;
        Ok(())
    }

    fn finish(&self, mut config: ContainerConfig) -> Result<ContainerConfig> {
        self.apply_environment_variables(&mut config)?;
        if self.validate_on_load {
            config.validate()?;
        }
        Ok(config)
    }

    fn apply_environment_variables(&self, config: &mut ContainerConfig) -> Result<()> {
        let prefix = format!("{}_", self.env_prefix);

        for (key, value) in env::vars() {
            if let Some(name) = key.strip_prefix(&prefix) {
                Self::apply_env_var(config, name, &value)?;
            }
        }

        Ok(())
    }

    fn apply_env_var(config: &mut ContainerConfig, key: &str, value: &str) -> Result<()> {
        match key.to_uppercase().as_str() {
            "NAME" => config.name = Some(value.to_string()),
            "ERROR_POLICY" => config.error_policy = value.parse()?,
            "EAGER_SINGLETONS" => {
                config.eager_singletons = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("invalid boolean for EAGER_SINGLETONS: {value}"))?
            }
            "SKIP_LOG_CAPACITY" => {
                config.skip_log_capacity = value
                    .trim()
                    .parse()
                    .map_err(|_| anyhow!("invalid number for SKIP_LOG_CAPACITY: {value}"))?
            }
            other => debug!("Ignoring unknown configuration variable {}", other),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_from_toml() -> Result<()> {
        let loader = ConfigLoader::new().env_prefix("IOC_TEST_TOML");

        let toml_content = r#"
        name = "app"
        error_policy = "suppress"
        eager_singletons = true
        "#;

        let config = loader.load_from_toml(toml_content)?;
        assert_eq!(config.name.as_deref(), Some("app"));
        assert_eq!(config.error_policy, ErrorPolicy::Suppress);
        assert!(config.eager_singletons);
        assert_eq!(config.skip_log_capacity, 128);

        Ok(())
    }

    #[test]
    fn test_load_from_json_and_yaml() -> Result<()> {
        let loader = ConfigLoader::new().env_prefix("IOC_TEST_FORMATS");

        let config = loader.load_from_json(r#"{ "skip_log_capacity": 16 }"#)?;
        assert_eq!(config.skip_log_capacity, 16);
        assert_eq!(config.error_policy, ErrorPolicy::Raise);

        let config = loader.load_from_yaml("name: worker\nerror_policy: raise\n")?;
        assert_eq!(config.name.as_deref(), Some("worker"));

        Ok(())
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let loader = ConfigLoader::new().env_prefix("IOC_TEST_SAVE");
        let dir = TempDir::new()?;
        let config = ContainerConfig {
            eager_singletons: true,
            ..ContainerConfig::named("saved")
        };

        for file in ["ioc.toml", "ioc.json", "nested/ioc.yaml"] {
            let path = dir.path().join(file);
            loader.save_to_file(&config, &path)?;
            assert_eq!(loader.load_from_file(&path)?, config);
        }

        assert!(loader.load_from_file(dir.path().join("missing.ini")).is_err());
        Ok(())
    }

    #[test]
    fn test_environment_variables() -> Result<()> {
        env::set_var("IOC_TEST_ENV_NAME", "from-env");
        env::set_var("IOC_TEST_ENV_ERROR_POLICY", "suppress");
        env::set_var("IOC_TEST_ENV_SKIP_LOG_CAPACITY", "4");

        let config = ConfigLoader::new().env_prefix("IOC_TEST_ENV").load()?;
        assert_eq!(config.name.as_deref(), Some("from-env"));
        assert_eq!(config.error_policy, ErrorPolicy::Suppress);
        assert_eq!(config.skip_log_capacity, 4);

        env::remove_var("IOC_TEST_ENV_NAME");
        env::remove_var("IOC_TEST_ENV_ERROR_POLICY");
        env::remove_var("IOC_TEST_ENV_SKIP_LOG_CAPACITY");

        Ok(())
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let loader = ConfigLoader::new().env_prefix("IOC_TEST_VALIDATE");
        assert!(loader.load_from_json(r#"{ "skip_log_capacity": 0 }"#).is_err());
        assert!(loader.load_from_json(r#"{ "name": "  " }"#).is_err());
        assert!(loader
            .clone()
            .validate(false)
            .load_from_json(r#"{ "skip_log_capacity": 0 }"#)
            .is_ok());
        assert!("sometimes".parse::<ErrorPolicy>().is_err());
    }
}
