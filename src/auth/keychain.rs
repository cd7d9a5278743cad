//! Keychain implementation for credential management

use super::{Anonymous, AuthConfig, Authenticator, DockerAuthEntry, DockerConfig};
use crate::config::{Config, RegistryConfig};
use crate::reference::{Reference, DEFAULT_REGISTRY};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Trait for types that can resolve authentication for a given resource
pub trait Keychain: Send + Sync {
    /// Resolve authentication for a given resource (registry URL or image reference)
    fn resolve(&self, resource: &str) -> Result<Box<dyn Authenticator>>;
}

/// Resolve credentials for a resource through the full chain: Docker config
/// auths, credential helpers, then ferry's configured credential commands.
pub fn resolve_auth(resource: &str, config: &Config) -> Result<AuthConfig> {
    let keychain = MultiKeychain::new(vec![
        Box::new(DefaultKeychain::new()),
        Box::new(CommandKeychain::new(config.registries.clone())),
    ]);

    keychain.resolve(resource)?.authorization()
}

/// Default keychain implementation that checks Docker config files
pub struct DefaultKeychain {
    /// Cached config to avoid re-reading files
    config_cache: Arc<Mutex<Option<DockerConfig>>>,
}

impl DefaultKeychain {
    /// Create a new DefaultKeychain
    pub fn new() -> Self {
        Self {
            config_cache: Arc::new(Mutex::new(None)),
        }
    }

    /// Get paths to check for Docker config
    fn config_paths() -> Vec<PathBuf> {
        let mut paths = Vec::new();

        // Check DOCKER_CONFIG environment variable
        if let Ok(docker_config) = std::env::var("DOCKER_CONFIG") {
            paths.push(PathBuf::from(docker_config).join("config.json"));
        }

        // Check REGISTRY_AUTH_FILE environment variable
        if let Ok(auth_file) = std::env::var("REGISTRY_AUTH_FILE") {
            paths.push(PathBuf::from(auth_file));
        }

        // Check XDG_RUNTIME_DIR for containers auth
        if let Ok(xdg_runtime) = std::env::var("XDG_RUNTIME_DIR") {
            paths.push(PathBuf::from(xdg_runtime).join("containers/auth.json"));
        }

        // Check default Docker config location
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".docker/config.json"));
        }

        paths
    }

    /// Load Docker config from disk
    fn load_config(&self) -> Result<DockerConfig> {
        // Check cache first
        {
            let cache = self.config_cache.lock().unwrap();
            if let Some(config) = cache.as_ref() {
                return Ok(config.clone());
            }
        }

        // Try each config path
        for path in Self::config_paths() {
            if path.exists() {
                debug!("Checking Docker config at: {}", path.display());
                match std::fs::read_to_string(&path) {
                    Ok(content) => match serde_json::from_str::<DockerConfig>(&content) {
                        Ok(config) => {
                            debug!("Loaded Docker config from: {}", path.display());
                            let mut cache = self.config_cache.lock().unwrap();
                            *cache = Some(config.clone());
                            return Ok(config);
                        }
                        Err(e) => {
                            warn!("Failed to parse Docker config at {}: {}", path.display(), e);
                        }
                    },
                    Err(e) => {
                        warn!("Failed to read Docker config at {}: {}", path.display(), e);
                    }
                }
            }
        }

        // Return empty config if no valid config found
        Ok(DockerConfig::default())
    }

    /// Normalize registry URL for matching
    fn normalize_registry(registry: &str) -> Vec<String> {
        let mut variants = vec![registry.to_string()];

        // Add common variants
        if registry == "docker.io" || registry == "index.docker.io" {
            variants.push("docker.io".to_string());
            variants.push("index.docker.io".to_string());
            variants.push("https://index.docker.io/v1/".to_string());
            variants.push("https://index.docker.io/v2/".to_string());
        } else if !registry.starts_with("http://") && !registry.starts_with("https://") {
            // Add protocol variants
            variants.push(format!("https://{}", registry));
            variants.push(format!("http://{}", registry));

            // Add /v1/ and /v2/ variants
            variants.push(format!("https://{}/v1/", registry));
            variants.push(format!("https://{}/v2/", registry));
        }

        variants
    }

    /// Find auth entry for a registry
    fn find_auth_entry(&self, config: &DockerConfig, registry: &str) -> Option<DockerAuthEntry> {
        let variants = Self::normalize_registry(registry);

        for variant in variants {
            if let Some(entry) = config.auths.get(&variant) {
                return Some(entry.clone());
            }
        }

        None
    }

    /// Get credential helper for a registry
    fn get_credential_helper(&self, config: &DockerConfig, registry: &str) -> Option<String> {
        // Check specific credential helper for registry
        if let Some(helper) = config.cred_helpers.get(registry) {
            return Some(helper.clone());
        }

        // Check default credential store
        config.creds_store.clone()
    }

    /// Execute credential helper to get credentials
    fn execute_credential_helper(&self, helper: &str, registry: &str) -> Result<AuthConfig> {
        use std::io::Write;
        use std::process::{Command, Stdio};

        let helper_name = format!("docker-credential-{}", helper);

        debug!(
            "Executing credential helper: {} for {}",
            helper_name, registry
        );

        let mut child = Command::new(&helper_name)
            .arg("get")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context(format!(
                "Failed to spawn credential helper: {}",
                helper_name
            ))?;

        // Write registry URL to stdin
        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(registry.as_bytes())?;
            stdin.write_all(b"\n")?;
        }

        let output = child.wait_with_output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Credential helper {} failed: {}", helper_name, stderr);
        }

        // Parse output as JSON
        #[derive(serde::Deserialize)]
        struct HelperResponse {
            #[serde(rename = "Username")]
            username: Option<String>,
            #[serde(rename = "Secret")]
            secret: Option<String>,
            #[serde(rename = "ServerURL")]
            _server_url: Option<String>,
        }

        let response: HelperResponse = serde_json::from_slice(&output.stdout)
            .context("Failed to parse credential helper response")?;

        Ok(AuthConfig {
            username: response.username,
            password: response.secret,
            ..Default::default()
        })
    }
}

impl Default for DefaultKeychain {
    fn default() -> Self {
        Self::new()
    }
}

impl Keychain for DefaultKeychain {
    fn resolve(&self, resource: &str) -> Result<Box<dyn Authenticator>> {
        let config = self.load_config()?;
        let registry = extract_registry(resource);

        debug!(
            "Resolving auth for resource: {} (registry: {})",
            resource, registry
        );

        // Try to find auth entry in config
        if let Some(auth_entry) = self.find_auth_entry(&config, &registry) {
            debug!("Found auth entry for {}", registry);
            let auth_config = auth_entry.to_auth_config();

            // Return appropriate authenticator based on auth type
            if auth_config.is_anonymous() {
                return Ok(Box::new(Anonymous));
            }

            return Ok(Box::new(ConfigAuthenticator {
                config: auth_config,
            }));
        }

        // Try credential helper
        if let Some(helper) = self.get_credential_helper(&config, &registry) {
            debug!("Trying credential helper: {} for {}", helper, registry);
            match self.execute_credential_helper(&helper, &registry) {
                Ok(auth_config) => {
                    return Ok(Box::new(ConfigAuthenticator {
                        config: auth_config,
                    }));
                }
                Err(e) => {
                    warn!("Credential helper failed: {}", e);
                }
            }
        }

        // Default to anonymous
        debug!("No credentials found for {}, using anonymous", registry);
        Ok(Box::new(Anonymous))
    }
}

/// Keychain that mints short-lived passwords by running configured commands
///
/// This is the programmatic form of piping a cloud CLI's login password into
/// `docker login`: the command's stdout is the password, fresh on every run.
pub struct CommandKeychain {
    registries: HashMap<String, RegistryConfig>,
}

impl CommandKeychain {
    pub fn new(registries: HashMap<String, RegistryConfig>) -> Self {
        Self { registries }
    }

    fn run_credential_command(registry: &RegistryConfig, host: &str) -> Result<AuthConfig> {
        use std::process::Command;

        let argv = registry
            .credential_argv()
            .context("No credential command configured")?;

        let username = registry
            .username
            .clone()
            .with_context(|| format!("Registry {} has a credential command but no username", host))?;

        debug!("Running credential command for {}: {}", host, argv[0]);

        let output = Command::new(&argv[0])
            .args(&argv[1..])
            .output()
            .with_context(|| format!("Failed to run credential command: {}", argv[0]))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Credential command {} failed: {}", argv[0], stderr);
        }

        let password = String::from_utf8(output.stdout)
            .context("Credential command output is not UTF-8")?
            .trim()
            .to_string();

        if password.is_empty() {
            anyhow::bail!("Credential command {} produced no password", argv[0]);
        }

        Ok(AuthConfig::new(username, password))
    }
}

impl Keychain for CommandKeychain {
    fn resolve(&self, resource: &str) -> Result<Box<dyn Authenticator>> {
        let registry = extract_registry(resource);

        if let Some(registry_config) = self.registries.get(&registry) {
            if registry_config.credential_command.is_some() {
                let auth_config = Self::run_credential_command(registry_config, &registry)?;
                return Ok(Box::new(ConfigAuthenticator {
                    config: auth_config,
                }));
            }
        }

        Ok(Box::new(Anonymous))
    }
}

/// Authenticator that returns a fixed AuthConfig
struct ConfigAuthenticator {
    config: AuthConfig,
}

impl Authenticator for ConfigAuthenticator {
    fn authorization(&self) -> Result<AuthConfig> {
        Ok(self.config.clone())
    }
}

/// Multi-keychain that tries multiple keychains in order
pub struct MultiKeychain {
    keychains: Vec<Box<dyn Keychain>>,
}

impl MultiKeychain {
    /// Create a new MultiKeychain
    pub fn new(keychains: Vec<Box<dyn Keychain>>) -> Self {
        Self { keychains }
    }
}

impl Keychain for MultiKeychain {
    fn resolve(&self, resource: &str) -> Result<Box<dyn Authenticator>> {
        for keychain in &self.keychains {
            match keychain.resolve(resource) {
                Ok(auth) => {
                    // Check if it's not anonymous
                    if let Ok(config) = auth.authorization() {
                        if !config.is_anonymous() {
                            return Ok(auth);
                        }
                    }
                }
                Err(e) => {
                    debug!("Keychain failed: {}", e);
                }
            }
        }

        // Default to anonymous
        Ok(Box::new(Anonymous))
    }
}

/// Extract the registry host from an image reference or bare registry name
fn extract_registry(resource: &str) -> String {
    // A bare host like "localhost:5000" or "gcr.io" names itself; a bare
    // image like "ubuntu:latest" does not (a port is numeric, a tag rarely is)
    if !resource.contains('/') {
        if resource.contains('.') || resource == "localhost" {
            return resource.to_string();
        }
        if let Some((_, port)) = resource.rsplit_once(':') {
            if !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()) {
                return resource.to_string();
            }
        }
        return DEFAULT_REGISTRY.to_string();
    }

    match resource.parse::<Reference>() {
        Ok(reference) => reference.registry().to_string(),
        Err(_) => DEFAULT_REGISTRY.to_string(),
    }
}

/// Write basic credentials for a registry into the Docker config file
///
/// Updates the first config file the keychain would consult, preserving
/// everything else in it, so other tooling sees the same login.
pub fn persist_credentials(registry: &str, username: &str, password: &str) -> Result<PathBuf> {
    let path = DefaultKeychain::config_paths()
        .into_iter()
        .find(|p| p.exists())
        .or_else(|| dirs::home_dir().map(|home| home.join(".docker/config.json")))
        .context("Could not determine a Docker config path")?;

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str::<DockerConfig>(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?
    } else {
        DockerConfig::default()
    };

    config.auths.insert(
        registry.to_string(),
        DockerAuthEntry::from_basic(username, password),
    );

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let content = serde_json::to_string_pretty(&config)?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    debug!("Stored credentials for {} in {}", registry, path.display());
    Ok(path)
}
