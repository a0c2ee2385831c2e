use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::{
    config::{http::HttpResponse, Region},
    error::{DisplayErrorContext, SdkError},
    primitives::ByteStream,
    Client,
};
use keepsake_core::storage::{BlobStore, StoreError};
use tracing::{debug, instrument};

/// Objects addressed by key inside one bucket.
///
/// Deletes are idempotent, like S3's own DELETE. `load` reports `NotFound`
/// only for `NoSuchKey`; a missing bucket is a backend failure. `exists` only
/// reports `false` for an HTTP 404 from HEAD; every other failure surfaces as
/// an error so outages are never mistaken for absence.
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
    bucket: String,
}

impl S3Backend {
    /// Build a client from the default credential chain for `region`.
    /// `endpoint` targets an S3-compatible service with path-style addressing.
    pub async fn connect(bucket: &str, region: &str, endpoint: Option<&str>) -> Self {
        let shared = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        debug!(bucket, region, "s3 backend ready");
        Self::from_client(Client::from_conf(builder.build()), bucket)
    }

    pub fn from_client(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }
}

#[async_trait]
impl BlobStore for S3Backend {
    #[instrument(skip_all, fields(key = %key))]
    async fn load(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                    StoreError::not_found(key)
                } else {
                    sdk_err(err)
                }
            })?;
        let body = output.body.collect().await.map_err(StoreError::backend)?;
        Ok(body.into_bytes().to_vec())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn save(&self, key: &str, blob: &[u8]) -> Result<(), StoreError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(blob.to_vec()))
            .send()
            .await
            .map_err(sdk_err)?;
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(sdk_err)?;
        Ok(())
    }

    #[instrument(skip_all, fields(key = %key))]
    async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if is_head_not_found(&err) => Ok(false),
            Err(err) => Err(sdk_err(err)),
        }
    }
}

/// HEAD responses carry no body, so the status is the only signal available.
fn is_head_not_found<E>(err: &SdkError<E, HttpResponse>) -> bool {
    matches!(err, SdkError::ServiceError(service) if service.raw().status().as_u16() == 404)
}

fn sdk_err<E: std::error::Error + 'static>(err: SdkError<E, HttpResponse>) -> StoreError {
    StoreError::Backend {
        reason: DisplayErrorContext(&err).to_string(),
    }
}
