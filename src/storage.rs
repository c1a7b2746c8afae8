//! Object storage for transcript blobs.
//!
//! One JSON blob per media id at `{prefix}/{media_id}.json`, written through
//! a bucket-style HTTP storage API. Writes are idempotent (upsert) and URL
//! resolution yields either a public URL or a signed one with a bounded TTL,
//! depending on how the bucket is configured.
//!
//! The service token is read from the `STORAGE_SERVICE_KEY` environment
//! variable, following the same env-credential discipline as the other
//! external services.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::config::StorageConfig;

/// Environment variable holding the storage service token.
pub const SERVICE_KEY_ENV: &str = "STORAGE_SERVICE_KEY";

/// Capability contract for the transcript blob store.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Best-effort existence check.
    ///
    /// May report `false` for an object that exists when the bucket denies
    /// both listing and signing; the worst case is a redundant re-fetch,
    /// never a lost write.
    async fn exists(&self, path: &str) -> bool;

    /// Serialize `value` as canonical JSON and write it, overwriting when
    /// `upsert` is set. Returns a reachable URL for the object.
    async fn write_json(&self, path: &str, value: &serde_json::Value, upsert: bool)
        -> Result<String>;

    /// Download and parse a stored JSON object.
    async fn download_json(&self, path: &str) -> Result<serde_json::Value>;

    /// Resolve a URL for an existing object: public if the bucket is
    /// public, otherwise signed with the configured TTL.
    async fn resolve_url(&self, path: &str) -> Result<String>;
}

// ============ HTTP bucket store ============

/// Client for a bucket-style storage HTTP API.
pub struct BucketStore {
    base_url: String,
    bucket: String,
    public: bool,
    signed_ttl_secs: u64,
    service_key: String,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct ListedObject {
    name: String,
}

#[derive(Deserialize)]
struct SignedUrlResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl BucketStore {
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let service_key = std::env::var(SERVICE_KEY_ENV)
            .map_err(|_| anyhow::anyhow!("{} environment variable not set", SERVICE_KEY_ENV))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            public: config.public,
            signed_ttl_secs: config.signed_ttl_secs,
            service_key,
            client,
        })
    }

    fn object_url(&self, path: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url, self.bucket, path
        )
    }

    /// List names in the directory containing `path`, searching for the
    /// basename. Errors when the bucket policy denies listing.
    async fn list_matching(&self, directory: &str, filename: &str) -> Result<Vec<String>> {
        let url = format!(
            "{}/storage/v1/object/list/{}",
            self.base_url, self.bucket
        );
        let body = serde_json::json!({
            "prefix": directory,
            "limit": 1000,
            "search": filename,
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .json(&body)
            .send()
            .await
            .context("storage list request failed")?;

        if !resp.status().is_success() {
            bail!("storage list denied ({})", resp.status());
        }

        let items: Vec<ListedObject> = resp.json().await.context("invalid storage list response")?;
        Ok(items.into_iter().map(|i| i.name).collect())
    }

    /// Mint a signed URL for `path` with the given TTL.
    async fn sign(&self, path: &str, ttl_secs: u64) -> Result<String> {
        let url = format!(
            "{}/storage/v1/object/sign/{}/{}",
            self.base_url, self.bucket, path
        );
        let body = serde_json::json!({ "expiresIn": ttl_secs });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .json(&body)
            .send()
            .await
            .context("storage sign request failed")?;

        if !resp.status().is_success() {
            bail!("could not sign storage URL ({})", resp.status());
        }

        let signed: SignedUrlResponse =
            resp.json().await.context("invalid signed URL response")?;
        Ok(format!("{}/storage/v1{}", self.base_url, signed.signed_url))
    }
}

fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, file)) => (dir, file),
        None => ("", path),
    }
}

#[async_trait]
impl ObjectStore for BucketStore {
    async fn exists(&self, path: &str) -> bool {
        let (directory, filename) = split_path(path);
        match self.list_matching(directory, filename).await {
            Ok(names) => names.iter().any(|n| n == filename),
            // Listing can be denied under restrictive bucket policies; a
            // short-lived signed URL succeeding implies the object exists.
            Err(_) => self.sign(path, 1).await.is_ok(),
        }
    }

    async fn write_json(
        &self,
        path: &str,
        value: &serde_json::Value,
        upsert: bool,
    ) -> Result<String> {
        let payload = serde_json::to_string_pretty(value)?;

        let mut req = self
            .client
            .post(self.object_url(path))
            .bearer_auth(&self.service_key)
            .header("Content-Type", "application/json");
        if upsert {
            req = req.header("x-upsert", "true");
        }

        let resp = req
            .body(payload)
            .send()
            .await
            .with_context(|| format!("storage upload failed for {}", path))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("storage upload error {} for {}: {}", status, path, body);
        }

        self.resolve_url(path).await
    }

    async fn download_json(&self, path: &str) -> Result<serde_json::Value> {
        let resp = self
            .client
            .get(self.object_url(path))
            .bearer_auth(&self.service_key)
            .send()
            .await
            .with_context(|| format!("storage download failed for {}", path))?;

        if !resp.status().is_success() {
            bail!("storage download error {} for {}", resp.status(), path);
        }

        resp.json()
            .await
            .with_context(|| format!("stored object at {} is not valid JSON", path))
    }

    async fn resolve_url(&self, path: &str) -> Result<String> {
        if self.public {
            return Ok(format!(
                "{}/storage/v1/object/public/{}/{}",
                self.base_url, self.bucket, path
            ));
        }
        self.sign(path, self.signed_ttl_secs)
            .await
            .with_context(|| format!("could not resolve a URL for {}", path))
    }
}

// ============ In-memory store ============

/// In-memory [`ObjectStore`] used by tests.
///
/// `listable: false` simulates a bucket whose policy denies listing, forcing
/// the existence check through the signed-grant fallback; `fail_writes`
/// drives the storage-error path.
pub struct MemoryStore {
    objects: RwLock<HashMap<String, serde_json::Value>>,
    listable: bool,
    fail_writes: bool,
    sign_calls: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            listable: true,
            fail_writes: false,
            sign_calls: AtomicU64::new(0),
        }
    }

    pub fn non_listable() -> Self {
        Self {
            listable: false,
            ..Self::new()
        }
    }

    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::new()
        }
    }

    /// Pre-populate an object, bypassing the write path.
    pub fn insert(&self, path: &str, value: serde_json::Value) {
        self.objects
            .write()
            .unwrap()
            .insert(path.to_string(), value);
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.read().unwrap().contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.objects.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().unwrap().is_empty()
    }

    /// How many times the signed-grant fallback ran.
    pub fn sign_calls(&self) -> u64 {
        self.sign_calls.load(Ordering::SeqCst)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn exists(&self, path: &str) -> bool {
        if self.listable {
            self.contains(path)
        } else {
            // Signed-grant fallback: the grant succeeds only for objects
            // that are actually present.
            self.sign_calls.fetch_add(1, Ordering::SeqCst);
            self.contains(path)
        }
    }

    async fn write_json(
        &self,
        path: &str,
        value: &serde_json::Value,
        upsert: bool,
    ) -> Result<String> {
        if self.fail_writes {
            bail!("storage upload error 503 for {}: simulated outage", path);
        }
        if !upsert && self.contains(path) {
            bail!("object already exists at {}", path);
        }
        self.insert(path, value.clone());
        self.resolve_url(path).await
    }

    async fn download_json(&self, path: &str) -> Result<serde_json::Value> {
        self.objects
            .read()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no object at {}", path))
    }

    async fn resolve_url(&self, path: &str) -> Result<String> {
        Ok(format!("memory://{}", path))
    }
}
