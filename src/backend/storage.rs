use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use super::{SupabaseClient, check};
use crate::errors::BackendError;

const BUCKET_SIZE_LIMIT: &str = "20MB";
const BUCKET_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/webp"];

#[derive(Debug, Deserialize)]
struct BucketInfo {
    name: String,
}

impl SupabaseClient {
    fn storage_url(&self, path: &str) -> String {
        format!("{}/storage/v1/{}", self.base_url, path)
    }

    /// Create the public image bucket unless it already exists.
    pub async fn ensure_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        let request = self.http.get(self.storage_url("bucket"));
        let buckets: Vec<BucketInfo> = check(self.admin(request)?.send().await?)
            .await
            .map_err(|e| BackendError::Storage(format!("Failed listing buckets: {}", e)))?
            .json()
            .await?;

        if buckets.iter().any(|candidate| candidate.name == bucket) {
            tracing::debug!(bucket, "Storage bucket already exists");
            return Ok(());
        }

        let request = self
            .http
            .post(self.storage_url("bucket"))
            .json(&serde_json::json!({
                "id": bucket,
                "name": bucket,
                "public": true,
                "file_size_limit": BUCKET_SIZE_LIMIT,
                "allowed_mime_types": BUCKET_MIME_TYPES,
            }));
        check(self.admin(request)?.send().await?)
            .await
            .map_err(|e| BackendError::Storage(format!("Failed creating bucket {}: {}", bucket, e)))?;

        tracing::info!(bucket, "Created storage bucket");
        Ok(())
    }

    /// Upload (or overwrite) `object_path` in `bucket`. The content type is
    /// guessed from the path's extension.
    pub async fn upload_object(
        &self,
        bucket: &str,
        object_path: &str,
        bytes: Vec<u8>,
    ) -> Result<String, BackendError> {
        let content_type = mime_guess::from_path(object_path)
            .first_or_octet_stream()
            .to_string();
        let request = self
            .http
            .post(self.storage_url(&format!("object/{}/{}", bucket, object_path)))
            .header("x-upsert", "true")
            .header("content-type", content_type)
            .body(bytes);

        check(self.admin(request)?.send().await?)
            .await
            .map_err(|e| BackendError::Storage(format!("Failed uploading {}: {}", object_path, e)))?;

        Ok(self.public_url(bucket, object_path))
    }

    pub fn public_url(&self, bucket: &str, object_path: &str) -> String {
        self.storage_url(&format!("object/public/{}/{}", bucket, object_path))
    }
}

/// Resolve a stored image reference to a URL. Absolute `http(s)` URLs pass
/// through; `bucket/path` references need a configured client.
pub fn resolve_image_url(client: Option<&SupabaseClient>, image_path: Option<&str>) -> Option<String> {
    let image_path = image_path.filter(|p| !p.is_empty())?;

    let lower = image_path.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Some(image_path.to_string());
    }

    let client = client?;
    let (bucket, object_path) = image_path.split_once('/')?;
    if bucket.is_empty() || object_path.is_empty() {
        return None;
    }
    Some(client.public_url(bucket, object_path))
}

/// First 12 hex characters of the SHA-256 of `bytes`.
pub fn file_hash(bytes: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    digest[..12].to_string()
}

/// `file_hash` of a file on disk.
pub fn hash_file(path: &Path) -> std::io::Result<String> {
    Ok(file_hash(&std::fs::read(path)?))
}
