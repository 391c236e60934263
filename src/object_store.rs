use crate::config::S3Config;
use crate::error::ApiError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// Storage seam for uploaded image bytes
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload image bytes and return the stored object with its public URL
    async fn upload_image(&self, content_type: &str, bytes: Vec<u8>)
        -> Result<StoredObject, ApiError>;
}

/// Object store for product image bytes
pub struct ObjectStore {
    client: S3Client,
    config: S3Config,
}

/// A stored object: its key in the bucket and the public URL it resolves to
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
    pub size_bytes: i64,
}

impl ObjectStore {
    /// Create a new object store client
    pub async fn new(config: &S3Config) -> anyhow::Result<Self> {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Configure custom endpoint for MinIO/LocalStack
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        // Force path-style access for MinIO compatibility
        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            bucket = %config.bucket,
            region = %config.region,
            "object store initialized"
        );

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Generate an object key for an uploaded image
    pub fn generate_key(&self, content_type: &str) -> String {
        generate_key(content_type)
    }

    /// Public URL for an object key, honoring any configured override
    /// or custom endpoint
    pub fn public_url(&self, key: &str) -> String {
        public_url(&self.config, key)
    }

    /// Delete an object. Used for out-of-band cleanup of orphaned uploads;
    /// the create path never compensates automatically.
    #[instrument(skip(self), fields(key = %key))]
    pub async fn delete(&self, key: &str) -> Result<(), ApiError> {
        self.client
            .delete_object()
            .bucket(&self.config.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("image delete failed: {e}")))?;

        debug!(key = %key, "image deleted");
        Ok(())
    }

    /// Get the bucket name
    pub fn bucket(&self) -> &str {
        &self.config.bucket
    }
}

#[async_trait]
impl ImageStore for ObjectStore {
    /// Upload image bytes under a generated key
    #[instrument(skip(self, bytes), fields(content_type = %content_type, size_bytes = bytes.len()))]
    async fn upload_image(
        &self,
        content_type: &str,
        bytes: Vec<u8>,
    ) -> Result<StoredObject, ApiError> {
        let key = self.generate_key(content_type);
        let size_bytes = bytes.len() as i64;

        debug!(key = %key, "uploading image");

        self.client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .body(ByteStream::from(bytes))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| ApiError::Storage(format!("image upload failed: {e}")))?;

        let url = self.public_url(&key);

        info!(key = %key, size_bytes = size_bytes, "image uploaded");
        metrics::counter!("catalog.images.uploaded").increment(1);

        Ok(StoredObject {
            key,
            url,
            size_bytes,
        })
    }
}

/// Generate an object key for an uploaded image
/// Format: products/{date}/{uuid}.{ext}
///
/// The date prefix keeps listings and lifecycle policies time-based;
/// the UUID keeps keys collision-free across concurrent uploads.
fn generate_key(content_type: &str) -> String {
    let date = Utc::now().format("%Y-%m-%d");
    let ext = crate::product::extension_for(content_type);
    format!("products/{date}/{id}.{ext}", id = Uuid::new_v4())
}

/// Public URL for an object key: an explicit configured base wins,
/// custom endpoints (MinIO/LocalStack) serve path-style URLs, and AWS
/// proper uses the virtual-hosted bucket form
fn public_url(config: &S3Config, key: &str) -> String {
    if let Some(ref base) = config.public_base_url {
        return format!("{}/{}", base.trim_end_matches('/'), key);
    }
    if let Some(ref endpoint) = config.endpoint_url {
        return format!("{}/{}/{}", endpoint.trim_end_matches('/'), config.bucket, key);
    }
    format!(
        "https://{}.s3.{}.amazonaws.com/{}",
        config.bucket, config.region, key
    )
}
