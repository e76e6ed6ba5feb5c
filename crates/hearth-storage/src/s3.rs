use crate::traits::{validate_segment, PutResult, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use object_store::aws::{AmazonS3, AmazonS3Builder};
use object_store::path::Path;
use object_store::Error as ObjectStoreError;
use object_store::{Attribute, Attributes, ObjectStoreExt, PutOptions, PutPayload};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// S3 storage implementation
///
/// Buckets are chosen per call, so one client is built lazily per bucket and
/// cached for the life of the process.
pub struct S3Storage {
    region: Option<String>,
    endpoint_url: Option<String>, // Custom endpoint for S3-compatible providers
    public_base_url: Option<String>,
    clients: RwLock<HashMap<String, Arc<AmazonS3>>>,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint URL for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    /// * `public_base_url` - Optional prefix for the URLs handed back to callers,
    ///   for buckets served through a CDN or a provider's public object route
    pub fn new(
        region: Option<String>,
        endpoint_url: Option<String>,
        public_base_url: Option<String>,
    ) -> StorageResult<Self> {
        if region.is_none() && endpoint_url.is_none() {
            return Err(StorageError::ConfigError(
                "S3 storage needs a region or an endpoint".to_string(),
            ));
        }

        Ok(S3Storage {
            region,
            endpoint_url,
            public_base_url,
            clients: RwLock::new(HashMap::new()),
        })
    }

    fn client(&self, bucket: &str) -> StorageResult<Arc<AmazonS3>> {
        validate_segment("bucket", bucket)?;

        {
            let clients = self
                .clients
                .read()
                .map_err(|_| StorageError::BackendError("S3 client cache poisoned".to_string()))?;
            if let Some(client) = clients.get(bucket) {
                return Ok(client.clone());
            }
        }

        let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
        if let Some(ref region) = self.region {
            builder = builder.with_region(region.clone());
        }
        if let Some(ref endpoint) = self.endpoint_url {
            let allow_http = endpoint.starts_with("http://");
            builder = builder
                .with_endpoint(endpoint.clone())
                .with_allow_http(allow_http);
        }

        let client = Arc::new(
            builder
                .build()
                .map_err(|e| StorageError::ConfigError(e.to_string()))?,
        );

        let mut clients = self
            .clients
            .write()
            .map_err(|_| StorageError::BackendError("S3 client cache poisoned".to_string()))?;
        Ok(clients
            .entry(bucket.to_string())
            .or_insert(client)
            .clone())
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
        cache_control: &str,
    ) -> StorageResult<PutResult> {
        validate_segment("key", key)?;
        let client = self.client(bucket)?;
        let size = data.len() as u64;
        let location = Path::from(key);

        let mut attributes = Attributes::new();
        attributes.insert(Attribute::ContentType, content_type.to_string().into());
        attributes.insert(Attribute::CacheControl, cache_control.to_string().into());

        let start = std::time::Instant::now();

        object_store::ObjectStore::put_opts(
            client.as_ref(),
            &location,
            PutPayload::from(data),
            PutOptions::from(attributes),
        )
        .await
        .map_err(|e| {
            tracing::error!(
                error = %e,
                bucket = %bucket,
                key = %key,
                size_bytes = size,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "S3 put failed"
            );
            StorageError::UploadFailed(e.to_string())
        })?;

        let public_url = self.url_for(bucket, key);

        tracing::info!(
            bucket = %bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "S3 put successful"
        );

        Ok(PutResult {
            key: key.to_string(),
            public_url,
        })
    }

    async fn remove(&self, bucket: &str, keys: &[String]) -> StorageResult<()> {
        let client = self.client(bucket)?;

        for key in keys {
            validate_segment("key", key)?;
            let start = std::time::Instant::now();
            let location = Path::from(key.as_str());

            match client.delete(&location).await {
                Ok(()) | Err(ObjectStoreError::NotFound { .. }) => {
                    tracing::info!(
                        bucket = %bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 delete successful"
                    );
                }
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        bucket = %bucket,
                        key = %key,
                        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                        "S3 delete failed"
                    );
                    return Err(StorageError::DeleteFailed(e.to_string()));
                }
            }
        }

        Ok(())
    }

    /// Public URL for an object
    ///
    /// With `public_base_url`: `{public_base_url}/{bucket}/{key}`.
    /// For S3-compatible providers, path-style: `{endpoint}/{bucket}/{key}`.
    /// For AWS S3: `https://{bucket}.s3.{region}.amazonaws.com/{key}`.
    fn url_for(&self, bucket: &str, key: &str) -> String {
        if let Some(ref base) = self.public_base_url {
            format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
        } else if let Some(ref endpoint) = self.endpoint_url {
            format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, key)
        } else {
            format!(
                "https://{}.s3.{}.amazonaws.com/{}",
                bucket,
                self.region.as_deref().unwrap_or("us-east-1"),
                key
            )
        }
    }

    async fn exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        validate_segment("key", key)?;
        let client = self.client(bucket)?;
        let location = Path::from(key);
        match client.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::S3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_region_or_endpoint() {
        assert!(matches!(
            S3Storage::new(None, None, None),
            Err(StorageError::ConfigError(_))
        ));
    }

    #[test]
    fn aws_url_is_virtual_hosted() {
        let storage = S3Storage::new(Some("eu-west-1".to_string()), None, None).unwrap();
        assert_eq!(
            storage.url_for("event-media", "image-1-2.jpg"),
            "https://event-media.s3.eu-west-1.amazonaws.com/image-1-2.jpg"
        );
    }

    #[test]
    fn endpoint_url_is_path_style() {
        let storage =
            S3Storage::new(None, Some("http://localhost:9000/".to_string()), None).unwrap();
        assert_eq!(
            storage.url_for("event-media", "image-1-2.jpg"),
            "http://localhost:9000/event-media/image-1-2.jpg"
        );
    }

    #[test]
    fn public_base_url_wins() {
        let storage = S3Storage::new(
            None,
            Some("https://project.supabase.co/storage/v1/s3".to_string()),
            Some("https://project.supabase.co/storage/v1/object/public".to_string()),
        )
        .unwrap();
        let url = storage.url_for("event-media", "image-1-2.jpg");
        assert_eq!(
            url,
            "https://project.supabase.co/storage/v1/object/public/event-media/image-1-2.jpg"
        );
        assert_eq!(crate::keys::key_from_url(&url).unwrap(), "image-1-2.jpg");
    }

    #[test]
    fn rejects_bucket_with_separator() {
        let storage = S3Storage::new(Some("eu-west-1".to_string()), None, None).unwrap();
        assert!(matches!(
            storage.client("a/b"),
            Err(StorageError::InvalidKey(_))
        ));
    }
}
