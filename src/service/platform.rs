//! Platform detection service
//!
//! Reports which platforms a pushed image provides, so a multi-arch push
//! can be verified from the registry's side.

use anyhow::{Context, Result};
use tracing::info;

use crate::auth::resolve_auth;
use crate::config::Config;
use crate::reference::Reference;
use crate::registry::RegistryClient;

pub struct PlatformDetector;

impl PlatformDetector {
    /// List the platforms a remote image provides
    pub async fn detect(config: &Config, image: &str) -> Result<Vec<String>> {
        let reference =
            Reference::parse_with_default(image, config.default_registry.as_deref())
                .with_context(|| format!("Invalid image reference: {}", image))?;

        info!("Fetching platforms for {}", reference);

        let auth = resolve_auth(&reference.to_string(), config)?;
        let mut client = RegistryClient::new(config)?;

        let platforms = client.get_image_platforms(&reference, &auth).await?;

        if platforms.is_empty() {
            info!("{} reports no platforms", reference);
        } else {
            info!("{} provides: {}", reference, platforms.join(", "));
        }

        Ok(platforms)
    }
}
