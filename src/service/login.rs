//! Login service: mint short-lived credentials and store them
//!
//! Credentials come either from stdin or from the registry's configured
//! credential command. They are verified against the registry before being
//! written to the Docker config file, so a bad token fails here and not in
//! the middle of a push.

use anyhow::{Context, Result};
use std::io::Read;
use tracing::info;

use crate::auth::{persist_credentials, AuthConfig};
use crate::config::Config;
use crate::registry::RegistryClient;

pub struct LoginService;

impl LoginService {
    pub async fn login(
        config: &Config,
        registry: &str,
        username: Option<String>,
        password_stdin: bool,
    ) -> Result<()> {
        let registry_config = config.registry(registry);

        let username = username
            .or_else(|| registry_config.and_then(|r| r.username.clone()))
            .context("No username given; pass --username or configure one for this registry")?;

        let password = if password_stdin {
            let mut password = String::new();
            std::io::stdin()
                .read_to_string(&mut password)
                .context("Failed to read password from stdin")?;
            password.trim().to_string()
        } else {
            let argv = registry_config
                .and_then(|r| r.credential_argv())
                .context(
                    "No password source; pass --password-stdin or configure a credential command",
                )?;
            run_credential_command(&argv)?
        };

        if password.is_empty() {
            anyhow::bail!("Empty password");
        }

        let auth = AuthConfig::new(username.clone(), password.clone());
        let mut client = RegistryClient::new(config)?;
        client
            .check_credentials(registry, &auth)
            .await
            .with_context(|| format!("Login to {} failed", registry))?;

        let path = persist_credentials(registry, &username, &password)?;
        info!(
            "Login to {} succeeded; credentials stored in {}",
            registry,
            path.display()
        );

        Ok(())
    }
}

fn run_credential_command(argv: &[String]) -> Result<String> {
    use std::process::Command;

    info!("Obtaining short-lived credentials via {}", argv[0]);

    let output = Command::new(&argv[0])
        .args(&argv[1..])
        .output()
        .with_context(|| format!("Failed to run credential command: {}", argv[0]))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Credential command {} failed: {}", argv[0], stderr);
    }

    Ok(String::from_utf8(output.stdout)
        .context("Credential command output is not UTF-8")?
        .trim()
        .to_string())
}
