use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use uuid::Uuid;

use crate::errors::AppError;

/// How long signed playback URLs stay valid. Clients cache them for most of
/// this window and re-request on expiry.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Blob storage seam. The production implementation is S3 (or MinIO); tests
/// substitute an in-memory fake to exercise failure ordering without a
/// network.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, body: Bytes, content_type: &str)
        -> Result<(), AppError>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, AppError>;

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), AppError>;

    /// Time-limited GET URL for browser playback.
    async fn signed_url(&self, bucket: &str, key: &str) -> Result<String, AppError>;
}

/// Object key for a recording's audio blob, namespaced per owner and project
/// so writes from different users can never contend.
pub fn audio_key(user_id: Uuid, project_id: Uuid, recording_id: Uuid) -> String {
    format!("{user_id}/{project_id}/{recording_id}.webm")
}

/// Object key for a chat attachment, namespaced per thread.
pub fn attachment_key(thread_id: Uuid, timestamp_millis: i64, file_name: &str) -> String {
    format!("{thread_id}/{timestamp_millis}_{file_name}")
}

#[derive(Clone)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
}

impl S3Store {
    pub fn new(client: aws_sdk_s3::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: Bytes,
        content_type: &str,
    ) -> Result<(), AppError> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("put {bucket}/{key}: {e}")))?;
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Bytes, AppError> {
        let object = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("get {bucket}/{key}: {e}")))?;

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| AppError::Storage(format!("read {bucket}/{key}: {e}")))?;
        Ok(data.into_bytes())
    }

    async fn delete(&self, bucket: &str, key: &str) -> Result<(), AppError> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("delete {bucket}/{key}: {e}")))?;
        Ok(())
    }

    async fn signed_url(&self, bucket: &str, key: &str) -> Result<String, AppError> {
        let presigning = PresigningConfig::expires_in(SIGNED_URL_TTL)
            .map_err(|e| AppError::Storage(format!("presigning config: {e}")))?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage(format!("presign {bucket}/{key}: {e}")))?;

        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_key_is_namespaced_per_owner_and_project() {
        let user = Uuid::new_v4();
        let project = Uuid::new_v4();
        let recording = Uuid::new_v4();
        let key = audio_key(user, project, recording);
        assert_eq!(key, format!("{user}/{project}/{recording}.webm"));
    }

    #[test]
    fn attachment_key_includes_thread_and_timestamp() {
        let thread = Uuid::new_v4();
        let key = attachment_key(thread, 1700000000000, "notes.pdf");
        assert_eq!(key, format!("{thread}/1700000000000_notes.pdf"));
    }
}
