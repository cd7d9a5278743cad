//! Release service: the whole pipeline in one pass
//!
//! Ensures the builder exists and is bootstrapped, builds the image for
//! every requested platform, and pushes the result to the registry.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};

use crate::builder::{warn_unsupported, BuildOptions, Buildx};
use crate::config::Config;
use crate::service::PushService;

/// Configuration for a release operation
pub struct ReleaseConfig {
    pub context: PathBuf,
    pub image: String,
    pub platforms: Vec<String>,
    pub builder: String,
}

pub struct ReleaseService;

impl ReleaseService {
    /// Build and push a multi-platform image, returning its digest reference
    pub async fn release(config: &Config, release: ReleaseConfig) -> Result<String> {
        let buildx = Buildx::new()?;

        let supported = Self::ensure_builder(&buildx, &release.builder)?;
        warn_unsupported(&release.platforms, &supported);

        // Build into a temporary archive; it only needs to live until the push
        let workdir = tempfile::tempdir().context("Failed to create temporary directory")?;
        let archive = workdir.path().join("image.oci.tar");

        buildx.build(&BuildOptions {
            context: release.context.clone(),
            image: release.image.clone(),
            platforms: release.platforms.clone(),
            builder: release.builder.clone(),
            output: archive.clone(),
        })?;

        let digest_ref = PushService::push(config, &archive, &release.image).await?;

        info!("Released {}", digest_ref);
        Ok(digest_ref)
    }

    /// Create and bootstrap the builder if needed; returns its platforms
    pub fn ensure_builder(buildx: &Buildx, name: &str) -> Result<Vec<String>> {
        if !buildx.builder_exists(name) {
            info!("Builder {} does not exist, creating it", name);
            buildx.create_builder(name, Some("docker-container"), &[], false)?;
        } else {
            debug!("Builder {} already exists", name);
        }

        buildx.bootstrap(name)
    }
}
