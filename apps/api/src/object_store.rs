//! Object storage port and its S3 implementation.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{Delete, ObjectCannedAcl, ObjectIdentifier};
use aws_sdk_s3::Client as S3Client;
use thiserror::Error;
use tracing::debug;

use crate::auth::UserId;

#[derive(Debug, Error)]
pub enum ObjectStoreError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("presigning failed: {0}")]
    Presign(String),

    #[error("object store request failed: {0}")]
    Request(String),
}

pub type ObjectStoreResult<T> = Result<T, ObjectStoreError>;

/// A presigned PUT plus the headers the client must send verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct PresignedPut {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectMeta {
    pub size: i64,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: i64,
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Presigns a private PUT tagged with the uploading user.
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        owner: &UserId,
    ) -> ObjectStoreResult<PresignedPut>;
    async fn presign_get(&self, key: &str) -> ObjectStoreResult<String>;
    async fn head(&self, key: &str) -> ObjectStoreResult<ObjectMeta>;
    async fn delete(&self, key: &str) -> ObjectStoreResult<()>;
    /// Returns the keys that could not be deleted.
    async fn delete_batch(&self, keys: &[String]) -> ObjectStoreResult<Vec<String>>;
    async fn list_prefix(&self, prefix: &str) -> ObjectStoreResult<Vec<ObjectSummary>>;
}

/// S3 (or MinIO) bucket.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: S3Client,
    bucket: String,
    presign_expiry: Duration,
}

impl S3ObjectStore {
    pub fn new(client: S3Client, bucket: impl Into<String>, presign_expiry: Duration) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            presign_expiry,
        }
    }

    fn presigning(&self) -> ObjectStoreResult<PresigningConfig> {
        PresigningConfig::expires_in(self.presign_expiry)
            .map_err(|e| ObjectStoreError::Presign(e.to_string()))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn presign_put(
        &self,
        key: &str,
        content_type: &str,
        owner: &UserId,
    ) -> ObjectStoreResult<PresignedPut> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .acl(ObjectCannedAcl::Private)
            .metadata("user", owner.as_str())
            .presigned(self.presigning()?)
            .await
            .map_err(|e| ObjectStoreError::Presign(e.to_string()))?;

        // Only the signed headers; the client must echo them exactly.
        let headers = presigned
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        Ok(PresignedPut {
            url: presigned.uri().to_string(),
            headers,
        })
    }

    async fn presign_get(&self, key: &str) -> ObjectStoreResult<String> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(self.presigning()?)
            .await
            .map_err(|e| ObjectStoreError::Presign(e.to_string()))?;
        Ok(presigned.uri().to_string())
    }

    async fn head(&self, key: &str) -> ObjectStoreResult<ObjectMeta> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(out) => Ok(ObjectMeta {
                size: out.content_length().unwrap_or(0),
                content_type: out.content_type().map(String::from),
            }),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => {
                Err(ObjectStoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(ObjectStoreError::Request(format!("HEAD {key}: {e}"))),
        }
    }

    async fn delete(&self, key: &str) -> ObjectStoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Request(format!("DELETE {key}: {e}")))?;
        Ok(())
    }

    async fn delete_batch(&self, keys: &[String]) -> ObjectStoreResult<Vec<String>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let objects = keys
            .iter()
            .map(|k| ObjectIdentifier::builder().key(k).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| ObjectStoreError::Request(e.to_string()))?;

        let out = self
            .client
            .delete_objects()
            .bucket(&self.bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| ObjectStoreError::Request(format!("batch delete: {e}")))?;

        let failed: Vec<String> = out
            .errors()
            .iter()
            .filter_map(|err| err.key().map(String::from))
            .collect();
        debug!(requested = keys.len(), failed = failed.len(), "batch delete finished");
        Ok(failed)
    }

    async fn list_prefix(&self, prefix: &str) -> ObjectStoreResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let out = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(|e| ObjectStoreError::Request(format!("LIST {prefix}: {e}")))?;

            objects.extend(out.contents().iter().filter_map(|obj| {
                obj.key().map(|key| ObjectSummary {
                    key: key.to_string(),
                    size: obj.size().unwrap_or(0),
                })
            }));

            match out.next_continuation_token() {
                Some(token) if out.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(objects)
    }
}
