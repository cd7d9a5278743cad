//! Client for the registry distribution protocol
//!
//! Speaks the v2 distribution API directly: token handshakes, blob uploads,
//! and manifest pushes, over TLS (or plain HTTP for registries the config
//! marks insecure).

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::header::{
    ACCEPT, AUTHORIZATION, CONTENT_TYPE, LOCATION, USER_AGENT, WWW_AUTHENTICATE,
};
use hyper::{HeaderMap, Method, StatusCode, Uri};
use hyper_tls::HttpsConnector;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::collections::HashSet;
use tracing::{debug, info};

use crate::auth::AuthConfig;
use crate::config::Config;
use crate::constants::media_type;
use crate::image::{is_index, is_manifest, ImageConfig, PlatformImage};
use crate::manifest::{ImageIndex, ManifestDescriptor, Platform};
use crate::reference::Reference;

mod token;
pub use token::{parse_challenge, Challenge, TokenCache, TokenResponse};

#[cfg(test)]
mod tests;

const USER_AGENT_VALUE: &str = concat!("ferry/", env!("CARGO_PKG_VERSION"));

const MANIFEST_ACCEPT: &str = concat!(
    "application/vnd.oci.image.index.v1+json, ",
    "application/vnd.docker.distribution.manifest.list.v2+json, ",
    "application/vnd.oci.image.manifest.v1+json, ",
    "application/vnd.docker.distribution.manifest.v2+json"
);

pub struct RegistryClient {
    client: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    insecure: HashSet<String>,
    tokens: TokenCache,
}

impl RegistryClient {
    pub fn new(config: &Config) -> Result<Self> {
        let https = HttpsConnector::new();
        let client = Client::builder(TokioExecutor::new()).build::<_, Full<Bytes>>(https);

        let insecure = config
            .registries
            .iter()
            .filter(|(_, registry)| registry.insecure)
            .map(|(host, _)| host.clone())
            .collect();

        Ok(Self {
            client,
            insecure,
            tokens: TokenCache::new(),
        })
    }

    /// Push one platform image: its layers, config, and manifest by digest
    pub async fn push_image(
        &mut self,
        reference: &Reference,
        image: &PlatformImage,
        auth: &AuthConfig,
    ) -> Result<ManifestDescriptor> {
        info!("Pushing {} image to {}", image.platform, reference);

        let authorization = self.authorize(reference, auth, true).await?;

        for layer in &image.layers {
            self.push_blob(
                reference,
                layer.read()?,
                &layer.digest,
                authorization.as_deref(),
            )
            .await
            .context("Failed to push layer")?;
        }

        let config_digest = &image.manifest.config.digest;
        self.push_blob(
            reference,
            image.config_data.clone(),
            config_digest,
            authorization.as_deref(),
        )
        .await
        .context("Failed to push config blob")?;

        // The manifest goes up byte-for-byte so its digest matches the layout
        let manifest_media_type = image
            .manifest
            .media_type
            .clone()
            .unwrap_or_else(|| media_type::OCI_MANIFEST.to_string());

        let digest = self
            .put_manifest(
                reference,
                &image.manifest_digest,
                &manifest_media_type,
                image.manifest_data.clone(),
                authorization.as_deref(),
            )
            .await
            .context("Failed to push manifest")?;

        info!(
            "Pushed {} image to {}/{}@{}",
            image.platform,
            reference.registry(),
            reference.repository(),
            digest
        );

        Ok(ManifestDescriptor {
            media_type: manifest_media_type,
            size: image.manifest_data.len() as i64,
            digest,
            platform: Some(Platform::parse(&image.platform)?),
            annotations: None,
        })
    }

    /// Push an image index referencing the given manifests under the tag
    ///
    /// Returns the digest reference of the pushed index.
    pub async fn push_index(
        &mut self,
        reference: &Reference,
        manifests: Vec<ManifestDescriptor>,
        auth: &AuthConfig,
    ) -> Result<String> {
        let index = ImageIndex::new(manifests);

        debug!("Pushing image index with {} manifest(s)", index.manifests.len());
        for descriptor in &index.manifests {
            if let Some(platform) = &descriptor.platform {
                debug!("  - {} {}", platform, descriptor.digest);
            }
        }

        let data = serde_json::to_vec(&index)?;
        let authorization = self.authorize(reference, auth, true).await?;

        let digest = self
            .put_manifest(
                reference,
                reference.manifest_ref(),
                media_type::OCI_INDEX,
                data,
                authorization.as_deref(),
            )
            .await
            .context("Failed to push image index")?;

        let digest_ref = format!(
            "{}/{}@{}",
            reference.registry(),
            reference.repository(),
            digest
        );
        info!("Pushed image index to {}", digest_ref);

        Ok(digest_ref)
    }

    /// Fetch the manifest for an image and extract available platforms
    pub async fn get_image_platforms(
        &mut self,
        reference: &Reference,
        auth: &AuthConfig,
    ) -> Result<Vec<String>> {
        debug!("Fetching platforms for {}", reference);

        let authorization = self.authorize(reference, auth, false).await?;
        let (content_type, data) = self
            .get_manifest(reference, authorization.as_deref())
            .await?;

        let mut platforms = Vec::new();

        if is_index(&content_type) {
            let index: ImageIndex =
                serde_json::from_slice(&data).context("Failed to parse image index")?;
            for descriptor in &index.manifests {
                if let Some(platform) = &descriptor.platform {
                    if platform.os == "unknown" || platform.architecture == "unknown" {
                        continue;
                    }
                    platforms.push(platform.to_string());
                }
            }
        } else if is_manifest(&content_type) {
            let manifest: crate::image::Manifest =
                serde_json::from_slice(&data).context("Failed to parse image manifest")?;
            let config_data = self
                .get_blob(
                    reference,
                    &manifest.config.digest,
                    authorization.as_deref(),
                )
                .await?;
            let config: ImageConfig =
                serde_json::from_slice(&config_data).context("Failed to parse image config")?;
            platforms.push(format!("{}/{}", config.os, config.architecture));
        } else {
            bail!("Unexpected manifest media type: {}", content_type);
        }

        platforms.sort();
        platforms.dedup();

        Ok(platforms)
    }

    /// Verify credentials against a registry without pushing anything
    pub async fn check_credentials(&mut self, registry: &str, auth: &AuthConfig) -> Result<()> {
        let uri = self.v2_uri(registry)?;
        let basic = auth.to_authorization_header()?;

        let (status, headers, _) = self
            .request(Method::GET, uri, Vec::new(), None, basic.as_deref())
            .await?;

        if status.is_success() {
            return Ok(());
        }

        if status != StatusCode::UNAUTHORIZED {
            bail!("Registry {} answered {}", registry, status);
        }

        let challenge = challenge_from(&headers)?;
        match challenge {
            Challenge::Basic => {
                bail!("Registry {} rejected the credentials", registry)
            }
            Challenge::Bearer { realm, service, .. } => {
                self.fetch_token(&realm, service.as_deref(), None, auth)
                    .await
                    .with_context(|| format!("Registry {} rejected the credentials", registry))?;
                Ok(())
            }
        }
    }

    /// Resolve the Authorization header to use against a repository
    async fn authorize(
        &mut self,
        reference: &Reference,
        auth: &AuthConfig,
        push: bool,
    ) -> Result<Option<String>> {
        let registry = reference.registry();
        let basic = auth.to_authorization_header()?;

        let (status, headers, _) = self
            .request(Method::GET, self.v2_uri(registry)?, Vec::new(), None, None)
            .await?;

        if status != StatusCode::UNAUTHORIZED {
            // Open registry, or one that takes credentials without a challenge
            return Ok(basic);
        }

        match challenge_from(&headers)? {
            Challenge::Basic => {
                if basic.is_none() {
                    debug!("Registry {} wants basic auth but none is available", registry);
                }
                Ok(basic)
            }
            Challenge::Bearer { realm, service, .. } => {
                let scope = if push {
                    format!("repository:{}:pull,push", reference.repository())
                } else {
                    format!("repository:{}:pull", reference.repository())
                };

                let cache_key = format!("{}|{}", registry, scope);
                if let Some(token) = self.tokens.get(&cache_key) {
                    return Ok(Some(format!("Bearer {}", token)));
                }

                let response = self
                    .fetch_token(&realm, service.as_deref(), Some(&scope), auth)
                    .await?;
                let token = response
                    .token()
                    .context("Token endpoint returned no token")?
                    .to_string();

                self.tokens
                    .put(cache_key, token.clone(), response.expires_in);
                Ok(Some(format!("Bearer {}", token)))
            }
        }
    }

    async fn fetch_token(
        &mut self,
        realm: &str,
        service: Option<&str>,
        scope: Option<&str>,
        auth: &AuthConfig,
    ) -> Result<TokenResponse> {
        let mut url = realm.to_string();
        let mut separator = if realm.contains('?') { '&' } else { '?' };

        if let Some(service) = service {
            url.push(separator);
            url.push_str("service=");
            url.push_str(service);
            separator = '&';
        }
        if let Some(scope) = scope {
            url.push(separator);
            url.push_str("scope=");
            url.push_str(scope);
        }

        debug!("Fetching token from {}", realm);

        let uri: Uri = url.parse().context("Invalid token endpoint URL")?;
        let basic = auth.to_authorization_header()?;
        let (status, _, body) = self
            .request(Method::GET, uri, Vec::new(), None, basic.as_deref())
            .await?;

        if !status.is_success() {
            bail!("Token endpoint {} answered {}", realm, status);
        }

        serde_json::from_slice(&body).context("Failed to parse token response")
    }

    /// Check whether the registry already has a blob
    async fn blob_exists(
        &mut self,
        reference: &Reference,
        digest: &str,
        authorization: Option<&str>,
    ) -> Result<bool> {
        let uri = self.repo_uri(reference, &format!("blobs/{}", digest))?;
        let (status, _, _) = self
            .request_following_redirects(Method::HEAD, uri, Vec::new(), None, authorization)
            .await?;

        match status {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            other => bail!("Blob check for {} answered {}", digest, other),
        }
    }

    /// Upload a blob unless the registry already has it
    async fn push_blob(
        &mut self,
        reference: &Reference,
        data: Vec<u8>,
        digest: &str,
        authorization: Option<&str>,
    ) -> Result<()> {
        if self.blob_exists(reference, digest, authorization).await? {
            debug!("Blob {} already present, skipping", digest);
            return Ok(());
        }

        debug!("Uploading blob {} ({} bytes)", digest, data.len());

        // Open an upload session
        let uri = self.repo_uri(reference, "blobs/uploads/")?;
        let (status, headers, _) = self
            .request(Method::POST, uri, Vec::new(), None, authorization)
            .await?;

        if status != StatusCode::ACCEPTED {
            bail!("Blob upload start answered {}", status);
        }

        let location = headers
            .get(LOCATION)
            .context("Upload session has no Location header")?
            .to_str()
            .context("Upload Location header is not valid UTF-8")?;

        let upload_uri = self.resolve_location(reference.registry(), location)?;
        let separator = if upload_uri.contains('?') { '&' } else { '?' };
        let put_uri: Uri = format!("{}{}digest={}", upload_uri, separator, digest)
            .parse()
            .context("Invalid upload URL")?;

        let (status, _, body) = self
            .request(
                Method::PUT,
                put_uri,
                vec![(CONTENT_TYPE, "application/octet-stream".to_string())],
                Some(data),
                authorization,
            )
            .await?;

        if !status.is_success() {
            bail!(
                "Blob upload for {} answered {}: {}",
                digest,
                status,
                String::from_utf8_lossy(&body)
            );
        }

        Ok(())
    }

    /// PUT a manifest under a tag or digest; returns the content digest
    async fn put_manifest(
        &mut self,
        reference: &Reference,
        manifest_ref: &str,
        content_type: &str,
        data: Vec<u8>,
        authorization: Option<&str>,
    ) -> Result<String> {
        let digest = format!("sha256:{}", sha256::digest(&data));
        let uri = self.repo_uri(reference, &format!("manifests/{}", manifest_ref))?;

        debug!("Pushing manifest to {}", uri);

        let (status, headers, body) = self
            .request(
                Method::PUT,
                uri,
                vec![(CONTENT_TYPE, content_type.to_string())],
                Some(data),
                authorization,
            )
            .await?;

        if !status.is_success() {
            bail!(
                "Manifest push answered {}: {}",
                status,
                String::from_utf8_lossy(&body)
            );
        }

        // Registries echo the digest back; distrust mismatches
        if let Some(echoed) = headers.get("docker-content-digest") {
            let echoed = echoed
                .to_str()
                .context("Docker-Content-Digest is not valid UTF-8")?;
            if echoed != digest {
                bail!(
                    "Registry reported digest {} for manifest {}",
                    echoed,
                    digest
                );
            }
        }

        Ok(digest)
    }

    /// GET a manifest; returns its content type and raw bytes
    async fn get_manifest(
        &mut self,
        reference: &Reference,
        authorization: Option<&str>,
    ) -> Result<(String, Bytes)> {
        let uri = self.repo_uri(reference, &format!("manifests/{}", reference.manifest_ref()))?;
        let (status, headers, body) = self
            .request_following_redirects(
                Method::GET,
                uri,
                vec![(ACCEPT, MANIFEST_ACCEPT.to_string())],
                None,
                authorization,
            )
            .await?;

        if !status.is_success() {
            bail!("Manifest fetch for {} answered {}", reference, status);
        }

        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or(media_type::DOCKER_MANIFEST)
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_string();

        Ok((content_type, body))
    }

    async fn get_blob(
        &mut self,
        reference: &Reference,
        digest: &str,
        authorization: Option<&str>,
    ) -> Result<Bytes> {
        let uri = self.repo_uri(reference, &format!("blobs/{}", digest))?;
        let (status, _, body) = self
            .request_following_redirects(Method::GET, uri, Vec::new(), None, authorization)
            .await?;

        if !status.is_success() {
            bail!("Blob fetch for {} answered {}", digest, status);
        }

        Ok(body)
    }

    /// One HTTP round trip; returns status, headers, and the collected body
    async fn request(
        &self,
        method: Method,
        uri: Uri,
        headers: Vec<(hyper::header::HeaderName, String)>,
        body: Option<Vec<u8>>,
        authorization: Option<&str>,
    ) -> Result<(StatusCode, HeaderMap, Bytes)> {
        let mut builder = hyper::Request::builder()
            .method(method)
            .uri(uri.clone())
            .header(USER_AGENT, USER_AGENT_VALUE);

        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        if let Some(authorization) = authorization {
            builder = builder.header(AUTHORIZATION, authorization);
        }

        let body = match body {
            Some(data) => Full::new(Bytes::from(data)),
            None => Full::new(Bytes::new()),
        };

        let request = builder.body(body).context("Failed to build request")?;

        let response = self
            .client
            .request(request)
            .await
            .with_context(|| format!("Request to {} failed", uri))?;

        let (parts, body) = response.into_parts();
        let bytes = body
            .collect()
            .await
            .context("Failed to read response body")?
            .to_bytes();

        Ok((parts.status, parts.headers, bytes))
    }

    /// Like `request`, but follows redirects (blob reads are often served
    /// from object storage). Authorization is dropped on redirect.
    async fn request_following_redirects(
        &self,
        method: Method,
        uri: Uri,
        headers: Vec<(hyper::header::HeaderName, String)>,
        body: Option<Vec<u8>>,
        authorization: Option<&str>,
    ) -> Result<(StatusCode, HeaderMap, Bytes)> {
        let mut uri = uri;
        let mut authorization = authorization.map(String::from);

        for _ in 0..4 {
            let (status, response_headers, bytes) = self
                .request(
                    method.clone(),
                    uri.clone(),
                    headers.clone(),
                    body.clone(),
                    authorization.as_deref(),
                )
                .await?;

            if !status.is_redirection() {
                return Ok((status, response_headers, bytes));
            }

            let location = response_headers
                .get(LOCATION)
                .context("Redirect without Location header")?
                .to_str()
                .context("Location header is not valid UTF-8")?;

            debug!("Following redirect to {}", location);
            uri = if location.starts_with("http://") || location.starts_with("https://") {
                location.parse().context("Invalid redirect URL")?
            } else {
                let base = format!(
                    "{}://{}",
                    uri.scheme_str().unwrap_or("https"),
                    uri.authority().map(|a| a.as_str()).unwrap_or_default()
                );
                format!("{}{}", base, location)
                    .parse()
                    .context("Invalid redirect URL")?
            };
            authorization = None;
        }

        bail!("Too many redirects")
    }

    fn scheme(&self, registry: &str) -> &'static str {
        if self.insecure.contains(registry) {
            "http"
        } else {
            "https"
        }
    }

    fn v2_uri(&self, registry: &str) -> Result<Uri> {
        format!("{}://{}/v2/", self.scheme(registry), api_host(registry))
            .parse()
            .context("Invalid registry URL")
    }

    fn repo_uri(&self, reference: &Reference, suffix: &str) -> Result<Uri> {
        let registry = reference.registry();
        format!(
            "{}://{}/v2/{}/{}",
            self.scheme(registry),
            api_host(registry),
            reference.repository(),
            suffix
        )
        .parse()
        .context("Invalid registry URL")
    }

    fn resolve_location(&self, registry: &str, location: &str) -> Result<String> {
        if location.starts_with("http://") || location.starts_with("https://") {
            Ok(location.to_string())
        } else if location.starts_with('/') {
            Ok(format!(
                "{}://{}{}",
                self.scheme(registry),
                api_host(registry),
                location
            ))
        } else {
            bail!("Unexpected upload location: {}", location)
        }
    }
}

/// The API host for a registry name; Docker Hub's API lives on a
/// different host than the name used in references
fn api_host(registry: &str) -> &str {
    match registry {
        "docker.io" | "index.docker.io" => "registry-1.docker.io",
        other => other,
    }
}

fn challenge_from(headers: &HeaderMap) -> Result<Challenge> {
    let header = headers
        .get(WWW_AUTHENTICATE)
        .context("Got 401 without a WWW-Authenticate header")?
        .to_str()
        .context("WWW-Authenticate header is not valid UTF-8")?;
    parse_challenge(header)
}
