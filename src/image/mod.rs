use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use serde::{Deserialize, Serialize};
use sha256::digest;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tar::Archive;
use tempfile::TempDir;
use tracing::{debug, info};

use crate::constants::media_type;
use crate::manifest::{ImageIndex, ManifestDescriptor};


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub architecture: String,
    pub os: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Config>,
    pub rootfs: RootFs,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<History>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "Env", default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<String>>,
    #[serde(rename = "Cmd", default, skip_serializing_if = "Option::is_none")]
    pub cmd: Option<Vec<String>>,
    #[serde(
        rename = "Entrypoint",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub entrypoint: Option<Vec<String>>,
    #[serde(
        rename = "WorkingDir",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub working_dir: Option<String>,
    #[serde(rename = "User", default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RootFs {
    #[serde(rename = "type")]
    pub fs_type: String,
    pub diff_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct History {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub empty_layer: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: i32,
    #[serde(rename = "mediaType", skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub config: Descriptor,
    pub layers: Vec<Descriptor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub size: i64,
    pub digest: String,
}

/// A layer blob inside an OCI layout, referenced by path so large layers
/// are only read when they are pushed
#[derive(Debug, Clone)]
pub struct LayerBlob {
    pub digest: String,
    pub media_type: String,
    pub size: i64,
    pub path: PathBuf,
}

impl LayerBlob {
    pub fn read(&self) -> Result<Vec<u8>> {
        let data = std::fs::read(&self.path)
            .with_context(|| format!("Failed to read layer blob {}", self.digest))?;
        if data.len() as i64 != self.size {
            bail!(
                "Layer {} is {} bytes, descriptor says {}",
                self.digest,
                data.len(),
                self.size
            );
        }
        Ok(data)
    }
}

/// One platform's image loaded from an OCI layout
#[derive(Debug)]
pub struct PlatformImage {
    pub platform: String,
    /// Raw manifest bytes; pushed verbatim so the digest stays stable
    pub manifest_data: Vec<u8>,
    pub manifest_digest: String,
    pub manifest: Manifest,
    pub config_data: Vec<u8>,
    pub layers: Vec<LayerBlob>,
}

impl PlatformImage {
    /// Check every layer's uncompressed content against the config's diff_ids
    pub fn verify(&self) -> Result<()> {
        let config: ImageConfig = serde_json::from_slice(&self.config_data)
            .with_context(|| format!("Failed to parse config {}", self.manifest.config.digest))?;

        let diff_ids = &config.rootfs.diff_ids;
        if diff_ids.len() != self.layers.len() {
            bail!(
                "{} image has {} layer(s) but {} diff_id(s)",
                self.platform,
                self.layers.len(),
                diff_ids.len()
            );
        }

        for (layer, diff_id) in self.layers.iter().zip(diff_ids) {
            let data = layer.read()?;
            let uncompressed = if is_gzip_layer(&layer.media_type) {
                let mut decoder = GzDecoder::new(&data[..]);
                let mut out = Vec::new();
                decoder
                    .read_to_end(&mut out)
                    .with_context(|| format!("Failed to decompress layer {}", layer.digest))?;
                out
            } else {
                data
            };

            let actual = format!("sha256:{}", digest(&uncompressed));
            if &actual != diff_id {
                bail!(
                    "Layer {} content is {}, config expects {}",
                    layer.digest,
                    actual,
                    diff_id
                );
            }
        }

        Ok(())
    }
}

fn is_gzip_layer(media: &str) -> bool {
    media.ends_with("+gzip") || media == media_type::DOCKER_LAYER_GZIP
}

/// An OCI layout archive unpacked for reading
///
/// The layout format is what `--output type=oci` build invocations emit:
/// an `oci-layout` version file, an `index.json`, and content-addressed
/// blobs under `blobs/sha256/`.
#[derive(Debug)]
pub struct Layout {
    // Keeps the unpacked blobs alive while images reference them
    _root: TempDir,
    images: Vec<PlatformImage>,
}

#[derive(Debug, Deserialize)]
struct LayoutVersion {
    #[serde(rename = "imageLayoutVersion")]
    image_layout_version: String,
}

impl Layout {
    /// Unpack an OCI layout archive and load every platform image in it
    pub fn open(archive: &Path) -> Result<Self> {
        info!("Reading OCI layout archive: {}", archive.display());

        let root = tempfile::tempdir().context("Failed to create temporary directory")?;
        let file = File::open(archive)
            .with_context(|| format!("Failed to open archive: {}", archive.display()))?;
        Archive::new(file)
            .unpack(root.path())
            .with_context(|| format!("Failed to unpack archive: {}", archive.display()))?;

        let layout_file = root.path().join("oci-layout");
        let version: LayoutVersion = serde_json::from_slice(
            &std::fs::read(&layout_file).context("Archive has no oci-layout file")?,
        )
        .context("Failed to parse oci-layout")?;

        if !version.image_layout_version.starts_with("1.") {
            bail!(
                "Unsupported OCI layout version: {}",
                version.image_layout_version
            );
        }

        let index: ImageIndex = serde_json::from_slice(
            &std::fs::read(root.path().join("index.json"))
                .context("Archive has no index.json")?,
        )
        .context("Failed to parse index.json")?;

        let images = load_images(root.path(), &index)?;
        if images.is_empty() {
            bail!("OCI layout contains no platform images");
        }

        info!(
            "Loaded {} platform image(s): {}",
            images.len(),
            images
                .iter()
                .map(|i| i.platform.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self { _root: root, images })
    }

    pub fn images(&self) -> &[PlatformImage] {
        &self.images
    }
}

fn load_images(root: &Path, index: &ImageIndex) -> Result<Vec<PlatformImage>> {
    let mut images = Vec::new();

    for descriptor in &index.manifests {
        if is_index(&descriptor.media_type) {
            // Multi-platform builds nest the real index one level down
            let nested_data = read_blob(root, &descriptor.digest)?;
            let nested: ImageIndex = serde_json::from_slice(&nested_data)
                .with_context(|| format!("Failed to parse nested index {}", descriptor.digest))?;

            for nested_descriptor in &nested.manifests {
                if let Some(image) = load_image(root, nested_descriptor)? {
                    images.push(image);
                }
            }
        } else if let Some(image) = load_image(root, descriptor)? {
            images.push(image);
        }
    }

    Ok(images)
}

fn load_image(root: &Path, descriptor: &ManifestDescriptor) -> Result<Option<PlatformImage>> {
    if !is_manifest(&descriptor.media_type) {
        debug!(
            "Skipping descriptor with media type {}",
            descriptor.media_type
        );
        return Ok(None);
    }

    // Attestation manifests carry an unknown/unknown platform
    if let Some(platform) = &descriptor.platform {
        if platform.os == "unknown" || platform.architecture == "unknown" {
            debug!("Skipping attestation manifest {}", descriptor.digest);
            return Ok(None);
        }
    }

    let manifest_data = read_blob(root, &descriptor.digest)?;
    let manifest: Manifest = serde_json::from_slice(&manifest_data)
        .with_context(|| format!("Failed to parse manifest {}", descriptor.digest))?;

    let config_data = read_blob(root, &manifest.config.digest)?;

    let platform = match &descriptor.platform {
        Some(platform) => platform.to_string(),
        None => {
            // Single-platform layouts leave the descriptor platform unset
            let config: ImageConfig = serde_json::from_slice(&config_data)
                .with_context(|| format!("Failed to parse config {}", manifest.config.digest))?;
            match &config.variant {
                Some(variant) => format!("{}/{}/{}", config.os, config.architecture, variant),
                None => format!("{}/{}", config.os, config.architecture),
            }
        }
    };

    let mut layers = Vec::new();
    for layer in &manifest.layers {
        let path = blob_path(root, &layer.digest)?;
        if !path.exists() {
            bail!("Layer blob {} missing from layout", layer.digest);
        }
        layers.push(LayerBlob {
            digest: layer.digest.clone(),
            media_type: layer.media_type.clone(),
            size: layer.size,
            path,
        });
    }

    debug!("Loaded {} image {}", platform, descriptor.digest);

    Ok(Some(PlatformImage {
        platform,
        manifest_digest: descriptor.digest.clone(),
        manifest_data,
        manifest,
        config_data,
        layers,
    }))
}

/// Read a blob and verify its content against the digest that names it
fn read_blob(root: &Path, blob_digest: &str) -> Result<Vec<u8>> {
    let path = blob_path(root, blob_digest)?;
    let data =
        std::fs::read(&path).with_context(|| format!("Failed to read blob {}", blob_digest))?;

    let actual = format!("sha256:{}", digest(&data));
    if actual != blob_digest {
        bail!("Blob digest mismatch: expected {}, got {}", blob_digest, actual);
    }

    Ok(data)
}

fn blob_path(root: &Path, blob_digest: &str) -> Result<PathBuf> {
    let hex = blob_digest
        .strip_prefix("sha256:")
        .with_context(|| format!("Unsupported digest algorithm: {}", blob_digest))?;
    Ok(root.join("blobs").join("sha256").join(hex))
}

pub fn is_index(media: &str) -> bool {
    media == media_type::OCI_INDEX || media == media_type::DOCKER_MANIFEST_LIST
}

pub fn is_manifest(media: &str) -> bool {
    media == media_type::OCI_MANIFEST || media == media_type::DOCKER_MANIFEST
}
