//! Testing utilities for the publish pipeline.
//!
//! [`FakeRegistry`] is an in-memory [`RegistryTransport`] that follows the
//! distribution protocol closely enough to drive the registry client and the
//! publisher without a network. Every request is recorded so tests can
//! assert on call counts and ordering, and individual responses can be
//! forced to fail.
//!
//! ```rust,ignore
//! let registry = Arc::new(FakeRegistry::new("https://ghcr.io"));
//! registry.add_blob(EMPTY_CONFIG_DIGEST);
//! let client = RegistryClient::new(registry.clone(), "https://ghcr.io/", "octo/app", "t");
//! // ... publish ...
//! assert_eq!(registry.count(Method::Head), 3);
//! ```

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use oci_publish_core::error::Result;
use parking_lot::Mutex;

use crate::oci::manifest::sha256_digest;
use crate::oci::transport::{HttpRequest, HttpResponse, Method, RegistryTransport};

#[derive(Default)]
struct FakeState {
    blobs: HashSet<String>,
    manifests: HashMap<String, Vec<u8>>,
    calls: Vec<HttpRequest>,
    uploads_started: usize,
    head_status: Option<u16>,
    initiate_status: Option<u16>,
    omit_location: bool,
    blob_put_status: Option<u16>,
    manifest_response: Option<(u16, String)>,
    manifest_digest: Option<String>,
    omit_digest: bool,
}

/// In-memory registry speaking the blob/manifest upload protocol.
pub struct FakeRegistry {
    base_url: String,
    state: Mutex<FakeState>,
}

impl FakeRegistry {
    /// Create an empty registry served at `base_url`.
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Pretend a blob is already stored.
    pub fn add_blob(&self, digest: &str) -> &Self {
        self.state.lock().blobs.insert(digest.to_string());
        self
    }

    /// Whether a blob is stored (pre-seeded or uploaded).
    pub fn has_blob(&self, digest: &str) -> bool {
        self.state.lock().blobs.contains(digest)
    }

    /// Manifest bytes stored under a tag or digest.
    pub fn manifest(&self, reference: &str) -> Option<Vec<u8>> {
        self.state.lock().manifests.get(reference).cloned()
    }

    /// Answer every blob HEAD with this status.
    pub fn set_head_status(&self, status: u16) -> &Self {
        self.state.lock().head_status = Some(status);
        self
    }

    /// Answer every upload-session POST with this status.
    pub fn set_initiate_status(&self, status: u16) -> &Self {
        self.state.lock().initiate_status = Some(status);
        self
    }

    /// Accept upload sessions but leave out the `location` header.
    pub fn omit_location_header(&self) -> &Self {
        self.state.lock().omit_location = true;
        self
    }

    /// Answer every blob PUT with this status.
    pub fn set_blob_put_status(&self, status: u16) -> &Self {
        self.state.lock().blob_put_status = Some(status);
        self
    }

    /// Answer every manifest PUT with this status and body.
    pub fn set_manifest_response(&self, status: u16, body: &str) -> &Self {
        self.state.lock().manifest_response = Some((status, body.to_string()));
        self
    }

    /// Report this digest for manifest PUTs instead of the real one.
    pub fn set_manifest_digest(&self, digest: &str) -> &Self {
        self.state.lock().manifest_digest = Some(digest.to_string());
        self
    }

    /// Leave out `docker-content-digest` on manifest PUTs.
    pub fn omit_digest_header(&self) -> &Self {
        self.state.lock().omit_digest = true;
        self
    }

    /// Every request received so far, in arrival order.
    pub fn calls(&self) -> Vec<HttpRequest> {
        self.state.lock().calls.clone()
    }

    /// Number of requests with the given method.
    pub fn count(&self, method: Method) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .count()
    }

    /// Number of blob PUTs (manifest PUTs excluded).
    pub fn blob_puts(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == Method::Put && c.url.contains("/blobs/uploads/"))
            .count()
    }

    /// Number of manifest PUTs.
    pub fn manifest_puts(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == Method::Put && c.url.contains("/manifests/"))
            .count()
    }

    fn path_of<'a>(&self, url: &'a str) -> &'a str {
        url.strip_prefix(self.base_url.as_str()).unwrap_or(url)
    }

    fn handle(&self, request: &HttpRequest) -> HttpResponse {
        let mut state = self.state.lock();
        state.calls.push(request.clone());
        let path = self.path_of(&request.url).to_string();

        match request.method {
            Method::Head => {
                if let Some(status) = state.head_status {
                    return HttpResponse::new(status).with_body("forced status");
                }
                let digest = path.rsplit('/').next().unwrap_or_default();
                if state.blobs.contains(digest) {
                    HttpResponse::new(200)
                } else {
                    HttpResponse::new(404)
                }
            }
            Method::Post => {
                if let Some(status) = state.initiate_status {
                    return HttpResponse::new(status).with_body("forced status");
                }
                state.uploads_started += 1;
                let response = HttpResponse::new(202);
                if state.omit_location {
                    return response;
                }
                let location = format!("{}{}", path, state.uploads_started);
                response.with_header("Location", location)
            }
            Method::Put if path.contains("/manifests/") => {
                if let Some((status, body)) = state.manifest_response.clone() {
                    return HttpResponse::new(status).with_body(body);
                }
                let reference = path.rsplit('/').next().unwrap_or_default().to_string();
                let digest = sha256_digest(&request.body);
                state.manifests.insert(reference, request.body.clone());
                state.manifests.insert(digest.clone(), request.body.clone());

                let response = HttpResponse::new(201);
                if state.omit_digest {
                    return response;
                }
                let reported = state.manifest_digest.clone().unwrap_or(digest);
                response.with_header("Docker-Content-Digest", reported)
            }
            Method::Put => {
                if let Some(status) = state.blob_put_status {
                    return HttpResponse::new(status).with_body("forced status");
                }
                let digest = request
                    .url
                    .split_once("digest=")
                    .map(|(_, d)| d.split('&').next().unwrap_or(d).to_string())
                    .unwrap_or_default();
                if sha256_digest(&request.body) != digest {
                    return HttpResponse::new(400)
                        .with_body(r#"{"errors":[{"code":"DIGEST_INVALID","message":"digest mismatch"}]}"#);
                }
                state.blobs.insert(digest);
                HttpResponse::new(201)
            }
        }
    }
}

#[async_trait]
impl RegistryTransport for FakeRegistry {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        Ok(self.handle(&request))
    }
}
