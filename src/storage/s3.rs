//! Amazon S3 object store backed by `aws-sdk-s3`.

use async_trait::async_trait;
use aws_sdk_s3::{
    primitives::ByteStream,
    types::{Delete, ObjectIdentifier},
    Client,
};
use tracing::{debug, info};

use super::{ObjectStore, StorageLocation};
use crate::error::{DigestError, Result};

/// S3 caps `DeleteObjects` at 1000 keys per request.
const DELETE_BATCH: usize = 1000;

#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl S3ObjectStore {
    pub fn new(sdk_config: &aws_config::SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    fn err(msg: impl Into<String>) -> DigestError {
        DigestError::Storage(msg.into())
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn list(&self, location: &StorageLocation) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        let mut continuation = None;

        loop {
            let mut req = self
                .client
                .list_objects_v2()
                .bucket(&location.bucket)
                .prefix(&location.prefix);
            if let Some(token) = continuation.take() {
                req = req.continuation_token(token);
            }

            let output = req
                .send()
                .await
                .map_err(|e| Self::err(format!("list {location} failed: {e}")))?;
            for obj in output.contents() {
                if let Some(key) = obj.key() {
                    keys.push(key.to_string());
                }
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        keys.sort();
        debug!(%location, count = keys.len(), "listed objects");
        Ok(keys)
    }

    async fn try_get(&self, bucket: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| Self::err(format!("read s3://{bucket}/{key} failed: {e}")))?
                    .into_bytes();
                Ok(Some(bytes.to_vec()))
            }
            Err(sdk_err) => {
                let service_err = sdk_err.into_service_error();
                if service_err.is_no_such_key() {
                    Ok(None)
                } else {
                    Err(Self::err(format!(
                        "get s3://{bucket}/{key} failed: {service_err}"
                    )))
                }
            }
        }
    }

    async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| Self::err(format!("put s3://{bucket}/{key} failed: {e}")))?;
        Ok(())
    }

    async fn delete_prefix(&self, location: &StorageLocation) -> Result<usize> {
        let keys = self.list(location).await?;
        for batch in keys.chunks(DELETE_BATCH) {
            let objects = batch
                .iter()
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .map_err(|e| Self::err(e.to_string()))
                })
                .collect::<Result<Vec<_>>>()?;
            let delete = Delete::builder()
                .set_objects(Some(objects))
                .quiet(true)
                .build()
                .map_err(|e| Self::err(e.to_string()))?;
            self.client
                .delete_objects()
                .bucket(&location.bucket)
                .delete(delete)
                .send()
                .await
                .map_err(|e| Self::err(format!("delete under {location} failed: {e}")))?;
        }
        info!(%location, count = keys.len(), "deleted objects");
        Ok(keys.len())
    }
}
