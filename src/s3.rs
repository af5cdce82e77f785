use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, SharedCredentialsProvider};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::debug;

use crate::error::{AbortFailure, UploadError, UploadResult};
use crate::types::{PartRecord, SessionId, UploadTarget};
use crate::StorageBackend;

/// S3 minimum size for all parts except the final one
const S3_MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Explicit configuration for the S3-compatible backend. The client is built
/// from this and injected; upload logic never reaches for ambient state.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub force_path_style: bool,
}

impl S3Config {
    pub fn new<S: Into<String>>(region: S) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            access_key: None,
            secret_key: None,
            force_path_style: false,
        }
    }

    /// Point at a custom S3-compatible endpoint (MinIO, R2, ...)
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint: S) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Use static credentials instead of the default provider chain
    pub fn with_credentials<A: Into<String>, K: Into<String>>(
        mut self,
        access_key: A,
        secret_key: K,
    ) -> Self {
        self.access_key = Some(access_key.into());
        self.secret_key = Some(secret_key.into());
        self
    }

    /// Use path-style addressing (required by most non-AWS endpoints)
    pub fn with_path_style(mut self) -> Self {
        self.force_path_style = true;
        self
    }

    /// Read configuration from the standard AWS environment variables
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
        );
        if let Ok(endpoint) = std::env::var("AWS_ENDPOINT_URL") {
            config = config.with_endpoint(endpoint).with_path_style();
        }
        if let (Ok(access_key), Ok(secret_key)) = (
            std::env::var("AWS_ACCESS_KEY_ID"),
            std::env::var("AWS_SECRET_ACCESS_KEY"),
        ) {
            config = config.with_credentials(access_key, secret_key);
        }
        config
    }
}

/// [`StorageBackend`] adapter for S3 and S3-compatible object stores
pub struct S3Backend {
    client: Client,
}

impl S3Backend {
    /// Build a client from explicit configuration
    pub async fn connect(config: S3Config) -> Self {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let credentials =
                Credentials::new(access_key.clone(), secret_key.clone(), None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
        }
    }

    /// Wrap an already-configured client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Pull the service error code and message out of an SDK error
fn describe<E, R>(err: &SdkError<E, R>) -> (Option<String>, String)
where
    E: ProvideErrorMetadata,
{
    match err.as_service_error() {
        Some(service) => (
            service.code().map(str::to_string),
            service
                .message()
                .map(str::to_string)
                .unwrap_or_else(|| "no message".to_string()),
        ),
        None => (None, err.to_string()),
    }
}

fn is_auth_code(code: Option<&str>) -> bool {
    matches!(
        code,
        Some("AccessDenied") | Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch")
    )
}

fn is_part_mismatch_code(code: Option<&str>) -> bool {
    matches!(
        code,
        Some("InvalidPart") | Some("InvalidPartOrder") | Some("EntityTooSmall")
    )
}

#[async_trait]
impl StorageBackend for S3Backend {
    async fn begin(&self, target: &UploadTarget) -> UploadResult<SessionId> {
        let out = self
            .client
            .create_multipart_upload()
            .bucket(&target.bucket)
            .key(&target.key)
            .send()
            .await
            .map_err(|e| {
                let (code, message) = describe(&e);
                if is_auth_code(code.as_deref()) {
                    UploadError::unauthorized(message)
                } else {
                    UploadError::backend_unavailable(message)
                }
            })?;

        let upload_id = out
            .upload_id()
            .ok_or_else(|| UploadError::backend_unavailable("backend returned no upload id"))?;
        debug!(target = %target, upload_id, "multipart upload created");
        Ok(SessionId::from_string(upload_id.to_string()))
    }

    async fn upload_part(
        &self,
        target: &UploadTarget,
        session_id: &SessionId,
        part_number: u32,
        data: Bytes,
    ) -> UploadResult<PartRecord> {
        let out = self
            .client
            .upload_part()
            .bucket(&target.bucket)
            .key(&target.key)
            .upload_id(session_id.as_str())
            .part_number(part_number as i32)
            .body(aws_sdk_s3::primitives::ByteStream::from(data))
            .send()
            .await
            .map_err(|e| {
                let (_, message) = describe(&e);
                UploadError::transient_io(part_number, message)
            })?;

        let etag = out
            .e_tag()
            .ok_or_else(|| UploadError::transient_io(part_number, "backend returned no etag"))?;
        Ok(PartRecord::new(part_number, etag))
    }

    async fn complete(
        &self,
        target: &UploadTarget,
        session_id: &SessionId,
        parts: &[PartRecord],
    ) -> UploadResult<()> {
        let completed = parts
            .iter()
            .map(|p| {
                CompletedPart::builder()
                    .part_number(p.part_number as i32)
                    .e_tag(&p.etag)
                    .build()
            })
            .collect::<Vec<_>>();

        self.client
            .complete_multipart_upload()
            .bucket(&target.bucket)
            .key(&target.key)
            .upload_id(session_id.as_str())
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                let (code, message) = describe(&e);
                if is_part_mismatch_code(code.as_deref()) {
                    UploadError::inconsistent_parts(message)
                } else {
                    UploadError::backend_unavailable(message)
                }
            })?;

        debug!(target = %target, session = %session_id, parts = parts.len(), "multipart upload completed");
        Ok(())
    }

    async fn abort(
        &self,
        target: &UploadTarget,
        session_id: &SessionId,
    ) -> Result<(), AbortFailure> {
        self.client
            .abort_multipart_upload()
            .bucket(&target.bucket)
            .key(&target.key)
            .upload_id(session_id.as_str())
            .send()
            .await
            .map_err(|e| {
                let (_, message) = describe(&e);
                AbortFailure::new(session_id.as_str(), message)
            })?;
        Ok(())
    }

    fn min_part_size(&self) -> u64 {
        S3_MIN_PART_SIZE
    }
}
