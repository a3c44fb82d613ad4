use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use tracing::info;

/// Blob read back from the bucket.
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        content_disposition: Option<String>,
    ) -> Result<()>;

    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> Result<String>;

    /// Unauthenticated URL for the key. Only reachable when the bucket is public.
    fn public_url(&self, key: &str) -> Result<String>;

    async fn get_object(&self, key: &str) -> Result<StoredBlob>;

    /// Deleting a key that does not exist succeeds.
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Creates the bucket when it is missing. Returns true when it was created.
    async fn ensure_bucket(&self) -> Result<bool>;
}

pub struct S3Storage {
    client: S3Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl S3Storage {
    pub fn new(
        client: S3Client,
        bucket: impl Into<String>,
        public_base_url: Option<String>,
    ) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_base_url,
        }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: Option<String>,
        content_disposition: Option<String>,
    ) -> Result<()> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .cache_control("max-age=3600")
            .body(ByteStream::from(bytes));

        if let Some(content_type) = content_type {
            request = request.content_type(content_type);
        }

        if let Some(content_disposition) = content_disposition {
            request = request.content_disposition(content_disposition);
        }

        request
            .send()
            .await
            .context("failed to upload object to storage")?;

        Ok(())
    }

    async fn presign_get_object(&self, key: &str, expires_in: Duration) -> Result<String> {
        let presign_config = PresigningConfig::builder()
            .expires_in(expires_in)
            .build()
            .context("failed to build presigning config")?;

        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .context("failed to generate signed URL")?;

        Ok(presigned.uri().to_string())
    }

    fn public_url(&self, key: &str) -> Result<String> {
        let Some(base) = self.public_base_url.as_deref() else {
            bail!("public storage URL is not configured");
        };
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| {
                percent_encoding::utf8_percent_encode(segment, percent_encoding::NON_ALPHANUMERIC)
                    .to_string()
            })
            .collect();
        Ok(format!("{base}/{}/{}", self.bucket, encoded.join("/")))
    }

    async fn get_object(&self, key: &str) -> Result<StoredBlob> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("failed to download object from storage")?;

        let content_type = response.content_type().map(|value| value.to_string());
        let bytes = response
            .body
            .collect()
            .await
            .context("failed to read object stream")?
            .into_bytes();

        Ok(StoredBlob {
            bytes,
            content_type,
        })
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .context("failed to delete object from storage")?;
        Ok(())
    }

    async fn ensure_bucket(&self) -> Result<bool> {
        match self.client.head_bucket().bucket(&self.bucket).send().await {
            Ok(_) => Ok(false),
            Err(SdkError::ServiceError(err)) if err.err().is_not_found() => {
                self.client
                    .create_bucket()
                    .bucket(&self.bucket)
                    .send()
                    .await
                    .context("failed to create storage bucket")?;
                info!(bucket = %self.bucket, "created storage bucket");
                Ok(true)
            }
            Err(err) => Err(err).context("failed to inspect storage bucket"),
        }
    }
}
