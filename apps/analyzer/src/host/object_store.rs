//! S3/MinIO-backed file storage capability.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::capability::{FileDescriptor, FileLike, FsCapability};
use crate::config::Config;

/// Prefix under which uploaded files land.
const UPLOAD_PREFIX: &str = "uploads";

pub struct ObjectStoreFs {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl ObjectStoreFs {
    /// Constructs a client configured for MinIO (local) or AWS (production).
    pub async fn connect(config: &Config) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            None,
            None,
            "analyzer-static",
        );

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&config.s3_endpoint)
            .load()
            .await;

        info!("object store client initialized (bucket: {})", config.s3_bucket);
        Self {
            client: aws_sdk_s3::Client::new(&s3_config),
            bucket: config.s3_bucket.clone(),
        }
    }
}

#[async_trait]
impl FsCapability for ObjectStoreFs {
    async fn write(&self, path: &str, data: Bytes) -> Result<FileDescriptor> {
        let size = data.len() as u64;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(path)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| anyhow!("storage write failed: {e}"))?;
        Ok(FileDescriptor {
            path: path.to_string(),
            name: base_name(path),
            size,
        })
    }

    async fn read(&self, path: &str) -> Result<Bytes> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| anyhow!("storage read failed: {e}"))?;
        let data = output
            .body
            .collect()
            .await
            .map_err(|e| anyhow!("storage read failed: {e}"))?;
        Ok(data.into_bytes())
    }

    async fn upload(&self, files: Vec<Arc<dyn FileLike>>) -> Result<Option<FileDescriptor>> {
        let mut last = None;
        for file in files {
            let bytes = file.read_bytes().await?;
            let key = format!("{UPLOAD_PREFIX}/{}-{}", Uuid::new_v4(), file.name());
            last = Some(self.write(&key, bytes).await?);
        }
        Ok(last)
    }

    async fn delete(&self, path: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(path)
            .send()
            .await
            .map_err(|e| anyhow!("storage delete failed: {e}"))?;
        Ok(())
    }

    async fn readdir(&self, path: &str) -> Result<Vec<FileDescriptor>> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(path.trim_start_matches('/'))
            .send()
            .await
            .map_err(|e| anyhow!("storage listing failed: {e}"))?;

        Ok(output
            .contents()
            .iter()
            .filter_map(|object| {
                let key = object.key()?.to_string();
                Some(FileDescriptor {
                    name: base_name(&key),
                    size: object.size().unwrap_or(0) as u64,
                    path: key,
                })
            })
            .collect())
    }
}

fn base_name(path: &str) -> String {
    path.rsplit('/').next().unwrap_or(path).to_string()
}
