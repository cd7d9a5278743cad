//! Push service: ship an OCI layout archive to a registry
//!
//! Uploads every platform image in the archive by digest, then publishes an
//! image index under the requested tag referencing all of them.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::auth::resolve_auth;
use crate::config::Config;
use crate::image::Layout;
use crate::reference::Reference;
use crate::registry::RegistryClient;

pub struct PushService;

impl PushService {
    /// Push a layout archive to the given reference
    ///
    /// Returns the digest reference of the published index.
    pub async fn push(config: &Config, archive: &Path, image: &str) -> Result<String> {
        let reference =
            Reference::parse_with_default(image, config.default_registry.as_deref())
                .with_context(|| format!("Invalid image reference: {}", image))?;

        let layout = Layout::open(archive)?;
        let auth = resolve_auth(&reference.to_string(), config)?;
        let mut client = RegistryClient::new(config)?;

        let mut descriptors = Vec::new();
        for platform_image in layout.images() {
            platform_image.verify().with_context(|| {
                format!("{} image failed verification", platform_image.platform)
            })?;

            let descriptor = client
                .push_image(&reference, platform_image, &auth)
                .await
                .with_context(|| {
                    format!("Failed to push {} image", platform_image.platform)
                })?;
            descriptors.push(descriptor);
        }

        let digest_ref = client.push_index(&reference, descriptors, &auth).await?;

        info!(
            "Pushed {} platform(s) to {}",
            layout.images().len(),
            reference
        );

        Ok(digest_ref)
    }
}
