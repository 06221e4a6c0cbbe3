//! OCI registry client for publishing action packages.
//!
//! Speaks the distribution protocol directly: blob existence check,
//! upload session + monolithic PUT for missing blobs, then the manifest PUT,
//! followed by verification of the digest the registry reports back.

use std::path::PathBuf;
use std::sync::Arc;

use base64::Engine;
use oci_publish_core::error::{PublishError, RegistryErrorDetail, Result};
use oci_publish_core::PublishOptions;
use tokio::task::JoinSet;

use super::manifest::{FileMetadata, Layer, Manifest, SerializedManifest};
use super::media::{LayerKind, EMPTY_CONFIG_BODY, EMPTY_CONFIG_DIGEST};
use super::transport::{HttpRequest, HttpResponse, Method, RegistryTransport};

/// Where the bytes of a blob come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobSource {
    /// The literal `{}` config body; never read from disk
    Empty,
    /// An archive on disk
    File(PathBuf),
    /// Bytes already in memory
    Bytes(Vec<u8>),
}

impl BlobSource {
    async fn read(&self) -> Result<Vec<u8>> {
        match self {
            Self::Empty => Ok(EMPTY_CONFIG_BODY.to_vec()),
            Self::File(path) => tokio::fs::read(path).await.map_err(|e| {
                PublishError::Collaborator(format!(
                    "Failed to read archive {}: {}",
                    path.display(),
                    e
                ))
            }),
            Self::Bytes(data) => Ok(data.clone()),
        }
    }
}

/// What happened to one blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlobOutcome {
    /// Registry already had the blob; nothing was sent
    AlreadyPresent,
    /// Blob was uploaded
    Uploaded,
}

/// Result of a successful package publish.
#[derive(Debug, Clone)]
pub struct PublishResult {
    /// URL of the published package version
    pub package_url: String,
    /// Manifest digest, confirmed by the registry
    pub published_digest: String,
    /// The manifest exactly as uploaded
    pub manifest: SerializedManifest,
}

/// Publishes blobs and manifests to one repository of a registry.
#[derive(Clone)]
pub struct RegistryClient {
    transport: Arc<dyn RegistryTransport>,
    base_url: String,
    repository: String,
    authorization: String,
}

impl RegistryClient {
    /// Create a client for `repository` on the registry at `registry_url`.
    pub fn new(
        transport: Arc<dyn RegistryTransport>,
        registry_url: &str,
        repository: &str,
        token: &str,
    ) -> Self {
        let encoded = base64::engine::general_purpose::STANDARD.encode(token);
        Self {
            transport,
            base_url: registry_url.trim_end_matches('/').to_string(),
            repository: repository.to_string(),
            authorization: format!("Bearer {}", encoded),
        }
    }

    /// Create a client from validated publish options.
    pub fn from_options(transport: Arc<dyn RegistryTransport>, options: &PublishOptions) -> Self {
        Self::new(
            transport,
            &options.registry_url,
            &options.repository,
            &options.token,
        )
    }

    /// Same registry and credentials, different repository.
    pub fn for_repository(&self, repository: &str) -> Self {
        Self {
            repository: repository.to_string(),
            ..self.clone()
        }
    }

    /// Registry base URL without trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Repository this client publishes to.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// URL of a package version.
    pub fn package_url(&self, version: &str) -> String {
        format!("{}/{}:{}", self.base_url, self.repository, version)
    }

    /// URL of a manifest addressed by digest.
    pub fn digest_url(&self, digest: &str) -> String {
        format!("{}/{}@{}", self.base_url, self.repository, digest)
    }

    /// Publish an action package: all blobs first, then the manifest.
    ///
    /// The manifest digest is computed before any request is made and must
    /// match the `docker-content-digest` the registry returns.
    pub async fn publish(
        &self,
        version: &str,
        files: &[FileMetadata],
        manifest: &Manifest,
    ) -> Result<PublishResult> {
        let serialized = manifest.serialize()?;
        let uploads = plan_uploads(manifest, files)?;

        tracing::info!(
            repository = %self.repository,
            version,
            digest = %serialized.digest,
            layers = uploads.len(),
            "Publishing package"
        );

        self.upload_layers(uploads).await?;

        let confirmed = self
            .upload_manifest(version, &manifest.media_type, &serialized)
            .await?;

        let actual = confirmed.unwrap_or_default();
        if actual != serialized.digest {
            return Err(PublishError::DigestMismatch {
                expected: serialized.digest.clone(),
                actual,
            });
        }

        let package_url = self.package_url(version);
        tracing::info!(
            package_url = %package_url,
            digest = %serialized.digest,
            "Package published"
        );

        Ok(PublishResult {
            package_url,
            published_digest: serialized.digest.clone(),
            manifest: serialized,
        })
    }

    /// Upload every blob concurrently and wait for all of them.
    ///
    /// The first failure is returned; tasks still in flight are detached
    /// and their results discarded.
    pub async fn upload_layers(&self, uploads: Vec<(Layer, BlobSource)>) -> Result<()> {
        let mut set = JoinSet::new();

        for (layer, source) in uploads {
            let client = self.clone();
            set.spawn(async move { client.upload_blob(&layer, &source).await });
        }

        while let Some(joined) = set.join_next().await {
            let outcome = match joined {
                Ok(result) => result,
                Err(e) => Err(PublishError::Transport(format!(
                    "Layer upload task failed: {}",
                    e
                ))),
            };
            if let Err(e) = outcome {
                set.detach_all();
                return Err(e);
            }
        }

        Ok(())
    }

    /// Make sure one blob exists in the registry, uploading it if needed.
    pub async fn upload_blob(&self, layer: &Layer, source: &BlobSource) -> Result<BlobOutcome> {
        if self.blob_exists(&layer.digest).await? {
            tracing::debug!(digest = %layer.digest, "Blob already exists, skipping upload");
            return Ok(BlobOutcome::AlreadyPresent);
        }

        let location = self.initiate_upload(&layer.digest).await?;
        let data = source.read().await?;
        let url = upload_url(&self.base_url, &location, &layer.digest);

        let request = self
            .request(Method::Put, url)
            .header("Content-Type", "application/octet-stream")
            .header("Content-Length", data.len().to_string())
            .body(data);
        let response = self.transport.send(request).await?;

        if response.status != 201 {
            return Err(PublishError::BlobUpload {
                digest: layer.digest.clone(),
                status: response.status,
                body: response.body,
            });
        }

        tracing::debug!(digest = %layer.digest, size = layer.size, "Blob uploaded");
        Ok(BlobOutcome::Uploaded)
    }

    /// HEAD the blob. 200/202 mean present, 404 absent, anything else fails.
    pub async fn blob_exists(&self, digest: &str) -> Result<bool> {
        let url = format!("{}/v2/{}/blobs/{}", self.base_url, self.repository, digest);
        let response = self.transport.send(self.request(Method::Head, url)).await?;

        match response.status {
            200 | 202 => Ok(true),
            404 => Ok(false),
            status => Err(PublishError::BlobCheck {
                digest: digest.to_string(),
                status,
                body: response.body,
            }),
        }
    }

    /// Open an upload session and return its location.
    async fn initiate_upload(&self, digest: &str) -> Result<String> {
        let url = format!("{}/v2/{}/blobs/uploads/", self.base_url, self.repository);
        let response = self.transport.send(self.request(Method::Post, url)).await?;

        if response.status != 202 {
            return Err(PublishError::UploadInitiation {
                digest: digest.to_string(),
                status: response.status,
                body: response.body,
            });
        }

        location_of(&response).ok_or_else(|| PublishError::MissingLocationHeader {
            digest: digest.to_string(),
        })
    }

    /// PUT a manifest under `reference` (a tag or a digest).
    ///
    /// Returns the `docker-content-digest` the registry reported, if any.
    /// Callers decide whether it has to match.
    pub async fn upload_manifest(
        &self,
        reference: &str,
        media_type: &str,
        manifest: &SerializedManifest,
    ) -> Result<Option<String>> {
        let url = format!(
            "{}/v2/{}/manifests/{}",
            self.base_url, self.repository, reference
        );
        let request = self
            .request(Method::Put, url)
            .header("Content-Type", media_type)
            .body(manifest.bytes.clone());
        let response = self.transport.send(request).await?;

        if response.status != 201 {
            return Err(PublishError::ManifestUpload {
                status: response.status,
                details: RegistryErrorDetail::parse_body(&response.body),
                body: response.body,
            });
        }

        Ok(response
            .header("docker-content-digest")
            .map(|d| d.to_string()))
    }

    fn request(&self, method: Method, url: String) -> HttpRequest {
        HttpRequest::new(method, url).header("Authorization", self.authorization.clone())
    }
}

/// Resolve every manifest layer to its kind and blob source.
///
/// Runs before any network call so that unknown media types and layers
/// without a matching archive fail without touching the registry.
pub fn plan_uploads(manifest: &Manifest, files: &[FileMetadata]) -> Result<Vec<(Layer, BlobSource)>> {
    manifest
        .layers
        .iter()
        .map(|layer| {
            let source = match LayerKind::from_media_type(&layer.media_type)? {
                LayerKind::EmptyConfig => {
                    if layer.digest != EMPTY_CONFIG_DIGEST {
                        return Err(PublishError::Config(format!(
                            "Config layer digest {} does not describe the empty config",
                            layer.digest
                        )));
                    }
                    BlobSource::Empty
                }
                kind @ (LayerKind::Tar | LayerKind::Zip) => files
                    .iter()
                    .find(|f| f.sha256 == layer.digest)
                    .map(|f| BlobSource::File(f.path.clone()))
                    .ok_or_else(|| {
                        PublishError::Config(format!(
                            "No {} archive matches layer digest {}",
                            kind, layer.digest
                        ))
                    })?,
            };
            Ok((layer.clone(), source))
        })
        .collect()
}

fn location_of(response: &HttpResponse) -> Option<String> {
    response
        .header("location")
        .filter(|l| !l.is_empty())
        .map(|l| l.to_string())
}

/// Build the blob PUT URL from an upload location.
///
/// Absolute-path locations are resolved against the registry origin, other
/// relative locations against the registry base; the digest is appended as a
/// query parameter.
fn upload_url(base_url: &str, location: &str, digest: &str) -> String {
    let absolute = if location.starts_with("http://") || location.starts_with("https://") {
        location.to_string()
    } else if location.starts_with('/') {
        format!("{}{}", origin(base_url), location)
    } else {
        format!("{}/{}", base_url, location)
    };

    let separator = if absolute.contains('?') { '&' } else { '?' };
    format!("{}{}digest={}", absolute, separator, digest)
}

/// Scheme and authority of a URL, without any path.
fn origin(url: &str) -> &str {
    let authority_start = url.find("://").map_or(0, |i| i + 3);
    match url[authority_start..].find('/') {
        Some(end) => &url[..authority_start + end],
        None => url,
    }
}
