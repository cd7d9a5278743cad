use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::constants::platform;

#[cfg(test)]
mod tests;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Default registry for references given without one
    pub default_registry: Option<String>,

    /// Platforms built when --platform is not given
    #[serde(default = "default_platforms")]
    pub default_platforms: Vec<String>,

    /// Name of the buildx builder instance to use
    #[serde(default = "default_builder")]
    pub builder: String,

    /// Per-registry settings, keyed by registry hostname
    #[serde(default)]
    pub registries: HashMap<String, RegistryConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RegistryConfig {
    /// Username to authenticate with (e.g. "AWS" for ECR)
    pub username: Option<String>,

    /// Command whose stdout is a short-lived password for this registry
    /// (e.g. "aws ecr get-login-password --region us-east-1")
    pub credential_command: Option<String>,

    /// Allow plain-HTTP access to this registry
    #[serde(default)]
    pub insecure: bool,
}

impl RegistryConfig {
    /// Split the credential command into an argv for execution
    pub fn credential_argv(&self) -> Option<Vec<String>> {
        let command = self.credential_command.as_ref()?;
        let argv: Vec<String> = command.split_whitespace().map(String::from).collect();
        if argv.is_empty() {
            None
        } else {
            Some(argv)
        }
    }
}

fn default_platforms() -> Vec<String> {
    platform::DEFAULT.iter().map(|p| p.to_string()).collect()
}

fn default_builder() -> String {
    "ferry".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_registry: None,
            default_platforms: default_platforms(),
            builder: default_builder(),
            registries: HashMap::new(),
        }
    }
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        if let Some(config_dir) = dirs::config_dir() {
            let config_path = config_dir.join("ferry").join("config.toml");
            if config_path.exists() {
                return Self::load_from(&config_path);
            }
        }
        Ok(Config::default())
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Settings for a registry, if the config has any
    pub fn registry(&self, registry: &str) -> Option<&RegistryConfig> {
        self.registries.get(registry)
    }
}
