//! S3 backend implementation
//!
//! Wraps aws-sdk-s3 and implements the Backend, StreamingBackend and
//! CopyStore traits from stow-core.

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::{ByteStream, DateTime};
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart, ServerSideEncryption};
use jiff::Timestamp;
use tokio::io::AsyncReadExt;

use stow_core::delivery::{ConditionalRead, DeliveryMetadata, ReadConditions};
use stow_core::rename::{self, CopyStore, KeyListing};
use stow_core::{
    Backend, BackendConfig, DirectoryPage, Error, Object, ObjectReader, ObjectStream, Result,
    S3Config, StreamingBackend, path,
};

use crate::listing::{S3DirectoryCursor, flat_objects};

/// Multipart part size; streams shorter than one part use a single PutObject
pub const PART_SIZE: usize = 8 * 1024 * 1024;

/// Buffers start here and grow towards a full part only as data arrives
const INITIAL_CHUNK_CAPACITY: usize = 64 * 1024;

/// Backend storing objects in an S3 bucket under an optional root prefix
#[derive(Debug, Clone)]
pub struct S3Backend {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    sse: Option<ServerSideEncryption>,
}

impl S3Backend {
    /// Build a client from an explicit configuration
    pub async fn new(config: &S3Config) -> Result<Self> {
        config.validate()?;

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if let Some(region) = &config.region {
            loader = loader.region(aws_config::Region::new(region.clone()));
        }
        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }
        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let credentials = aws_credential_types::Credentials::new(
                access_key,
                secret_key,
                config.session_token.clone(),
                None,
                "stowage-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }
        let sdk_config = loader.load().await;

        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        let mut backend = Self::with_client(
            aws_sdk_s3::Client::from_conf(s3_config),
            &config.bucket,
            &config.prefix,
        );
        backend.sse = config.sse.as_deref().map(ServerSideEncryption::from);

        tracing::debug!(bucket = %backend.bucket, prefix = %backend.prefix, "Created S3 backend");
        Ok(backend)
    }

    pub async fn from_config(config: &BackendConfig) -> Result<Self> {
        match config {
            BackendConfig::S3(s3) => Self::new(s3).await,
            other => Err(Error::Config(format!(
                "expected an s3 backend, got {}",
                other.kind()
            ))),
        }
    }

    /// Wrap an existing client
    pub fn with_client(client: aws_sdk_s3::Client, bucket: &str, prefix: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
            prefix: path::clean_prefix(prefix),
            sse: None,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.client
    }

    fn key(&self, relative: &str) -> String {
        path::normalize(&self.prefix, relative)
    }

    async fn head_exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(map_sdk_error(e, key)),
        }
    }

    async fn put_bytes(&self, key: &str, content: Vec<u8>) -> Result<()> {
        let size = content.len();
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type_for(key))
            .set_server_side_encryption(self.sse.clone())
            .body(ByteStream::from(content))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;

        tracing::debug!(key, bytes = size, "Uploaded object");
        Ok(())
    }

    async fn put_multipart(&self, key: &str, first: Vec<u8>, rest: &mut ObjectReader) -> Result<()> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type_for(key))
            .set_server_side_encryption(self.sse.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;
        let upload_id = created
            .upload_id()
            .ok_or_else(|| Error::General(format!("missing upload id for {key}")))?
            .to_string();

        match self.upload_parts(key, &upload_id, first, rest).await {
            Ok(parts) => {
                let count = parts.len();
                let upload = CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build();
                self.client
                    .complete_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .multipart_upload(upload)
                    .send()
                    .await
                    .map_err(|e| map_sdk_error(e, key))?;
                tracing::debug!(key, parts = count, "Completed multipart upload");
                Ok(())
            }
            Err(e) => {
                if let Err(abort_err) = self
                    .client
                    .abort_multipart_upload()
                    .bucket(&self.bucket)
                    .key(key)
                    .upload_id(&upload_id)
                    .send()
                    .await
                {
                    tracing::warn!(
                        key,
                        upload_id = %upload_id,
                        error = %DisplayErrorContext(&abort_err),
                        "Failed to abort multipart upload"
                    );
                }
                Err(e)
            }
        }
    }

    async fn upload_parts(
        &self,
        key: &str,
        upload_id: &str,
        first: Vec<u8>,
        rest: &mut ObjectReader,
    ) -> Result<Vec<CompletedPart>> {
        let mut parts = Vec::new();
        let mut chunk = first;
        let mut part_number: i32 = 1;

        while !chunk.is_empty() {
            let response = self
                .client
                .upload_part()
                .bucket(&self.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(|e| map_sdk_error(e, key))?;

            parts.push(
                CompletedPart::builder()
                    .set_e_tag(response.e_tag().map(str::to_string))
                    .part_number(part_number)
                    .build(),
            );
            part_number += 1;
            chunk = read_chunk(rest, PART_SIZE).await?;
        }

        Ok(parts)
    }
}

#[async_trait]
impl Backend for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<Object>> {
        let key_prefix = self.key(prefix);
        let listing_prefix = path::directory_prefix(&key_prefix);

        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&listing_prefix)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| map_sdk_error(e, prefix))?;

            objects.extend(flat_objects(&response, &key_prefix));

            continuation_token = response.next_continuation_token().map(str::to_string);
            if !response.is_truncated().unwrap_or(false) || continuation_token.is_none() {
                break;
            }
        }

        Ok(objects)
    }

    async fn list_objects_from_directory(&self, path: &str, limit: i32) -> Result<DirectoryPage> {
        let key = self.key(path);
        if key != self.prefix && self.head_exists(&key).await? {
            return Err(Error::PrefixIsAnObject(path::clean(path)));
        }

        DirectoryPage::start(Box::new(S3DirectoryCursor {
            client: self.client.clone(),
            bucket: self.bucket.clone(),
            root: self.prefix.clone(),
            listing_prefix: path::directory_prefix(&key),
            max_keys: (limit > 0).then_some(limit),
            continuation_token: None,
        }))
        .await
    }

    async fn get_object(&self, path: &str) -> Result<Object> {
        self.get_object_stream(path).await?.into_object().await
    }

    async fn put_object(&self, path: &str, content: Vec<u8>) -> Result<()> {
        self.put_bytes(&self.key(path), content).await
    }

    async fn delete_object(&self, path: &str) -> Result<()> {
        self.delete_key(&self.key(path)).await
    }

    async fn rename_prefix_or_object(&self, path: &str, new_path: &str) -> Result<()> {
        rename::rename_prefix_or_object(self, &self.prefix, path, new_path).await
    }
}

#[async_trait]
impl StreamingBackend for S3Backend {
    async fn get_object_stream(&self, path: &str) -> Result<ObjectStream> {
        let key = self.key(path);
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, path))?;

        let last_modified = response
            .last_modified()
            .map(to_timestamp)
            .unwrap_or(Timestamp::UNIX_EPOCH);

        Ok(ObjectStream {
            path: path.to_string(),
            last_modified,
            content: Box::pin(response.body.into_async_read()),
        })
    }

    async fn put_object_stream(&self, path: &str, mut content: ObjectReader) -> Result<()> {
        let key = self.key(path);
        let first = read_chunk(&mut content, PART_SIZE).await?;
        if first.len() < PART_SIZE {
            return self.put_bytes(&key, first).await;
        }
        self.put_multipart(&key, first, &mut content).await
    }

    async fn get_object_conditional(
        &self,
        path: &str,
        conditions: &ReadConditions,
    ) -> Result<ConditionalRead> {
        let key = self.key(path);
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .set_if_match(conditions.if_match.clone())
            .set_if_none_match(conditions.if_none_match.clone())
            .set_if_modified_since(conditions.if_modified_since.map(to_date_time))
            .set_if_unmodified_since(conditions.if_unmodified_since.map(to_date_time))
            .set_range(conditions.range.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, path))?;

        let metadata = DeliveryMetadata {
            cache_control: response.cache_control().map(str::to_string),
            expires: response.expires_string().map(str::to_string),
            content_disposition: response.content_disposition().map(str::to_string),
            content_encoding: response.content_encoding().map(str::to_string),
            content_language: response.content_language().map(str::to_string),
            content_length: response
                .content_length()
                .and_then(|l| u64::try_from(l).ok()),
            content_range: response.content_range().map(str::to_string),
            content_type: response.content_type().map(str::to_string),
            etag: response.e_tag().map(str::to_string),
            last_modified: response.last_modified().map(to_timestamp),
        };

        Ok(ConditionalRead {
            metadata,
            content: Box::pin(response.body.into_async_read()),
        })
    }
}

#[async_trait]
impl CopyStore for S3Backend {
    async fn object_exists(&self, key: &str) -> Result<bool> {
        self.head_exists(key).await
    }

    async fn list_keys(
        &self,
        prefix: &str,
        max_keys: Option<i32>,
        token: Option<String>,
    ) -> Result<KeyListing> {
        let response = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .set_max_keys(max_keys)
            .set_continuation_token(token)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, prefix))?;

        let keys = response
            .contents()
            .iter()
            .filter_map(|o| o.key().map(str::to_string))
            .collect();
        let next_token = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(KeyListing { keys, next_token })
    }

    async fn copy_key(&self, from: &str, to: &str) -> Result<()> {
        self.client
            .copy_object()
            .copy_source(copy_source(&self.bucket, from))
            .bucket(&self.bucket)
            .key(to)
            .set_server_side_encryption(self.sse.clone())
            .send()
            .await
            .map_err(|e| map_sdk_error(e, from))?;

        tracing::debug!(from, to, "Copied object");
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, key))?;
        Ok(())
    }
}

/// Read up to `size` bytes; a short chunk means the reader is exhausted
async fn read_chunk(reader: &mut ObjectReader, size: usize) -> Result<Vec<u8>> {
    let mut chunk = Vec::with_capacity(size.min(INITIAL_CHUNK_CAPACITY));
    (&mut *reader).take(size as u64).read_to_end(&mut chunk).await?;
    Ok(chunk)
}

/// `bucket/key` with each key segment percent-encoded
pub(crate) fn copy_source(bucket: &str, key: &str) -> String {
    let encoded: Vec<String> = key
        .split(path::SEPARATOR)
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect();
    format!("{bucket}/{}", encoded.join("/"))
}

fn content_type_for(key: &str) -> String {
    mime_guess::from_path(key)
        .first_or_octet_stream()
        .to_string()
}

pub(crate) fn to_timestamp(dt: &DateTime) -> Timestamp {
    Timestamp::new(dt.secs(), dt.subsec_nanos() as i32).unwrap_or(Timestamp::UNIX_EPOCH)
}

fn to_date_time(ts: Timestamp) -> DateTime {
    DateTime::from_secs(ts.as_second())
}

/// Translate an SDK failure into the core error taxonomy
pub(crate) fn map_sdk_error<E>(err: SdkError<E>, path: &str) -> Error
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let status = err.raw_response().map(|r| r.status().as_u16());
    let code = err.as_service_error().and_then(|e| e.code()).map(str::to_string);
    classify(status, code.as_deref(), path, DisplayErrorContext(&err).to_string())
}

pub(crate) fn classify(status: Option<u16>, code: Option<&str>, path: &str, message: String) -> Error {
    match (status, code) {
        (Some(304), _) | (_, Some("NotModified")) => Error::NotModified(path.to_string()),
        (Some(412), _) | (_, Some("PreconditionFailed")) => {
            Error::PreconditionFailed(path.to_string())
        }
        (Some(404), _) | (_, Some("NoSuchKey" | "NotFound")) => Error::NotFound(path.to_string()),
        (Some(401 | 403), _)
        | (_, Some("AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch" | "ExpiredToken")) => {
            Error::Auth(message)
        }
        _ => Error::Network(message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn offline_client() -> aws_sdk_s3::Client {
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .region(aws_sdk_s3::config::Region::new("us-east-1"))
            .build();
        aws_sdk_s3::Client::from_conf(config)
    }

    #[test]
    fn test_with_client_cleans_prefix() {
        let backend = S3Backend::with_client(offline_client(), "helm", "/charts/stable/");
        assert_eq!(backend.bucket(), "helm");
        assert_eq!(backend.prefix(), "charts/stable");
        assert_eq!(backend.key("mychart.tgz"), "charts/stable/mychart.tgz");
        assert_eq!(backend.key("/"), "charts/stable");
    }

    #[test]
    fn test_key_without_prefix() {
        let backend = S3Backend::with_client(offline_client(), "helm", "");
        assert_eq!(backend.key("a/./b/../c"), "a/c");
    }

    #[test]
    fn test_copy_source_encoding() {
        assert_eq!(copy_source("b", "dir/a b+c.tgz"), "b/dir/a%20b%2Bc.tgz");
        assert_eq!(copy_source("b", "plain"), "b/plain");
    }

    #[test]
    fn test_classify() {
        let msg = || "boom".to_string();
        assert!(matches!(classify(Some(404), None, "p", msg()), Error::NotFound(_)));
        assert!(matches!(
            classify(None, Some("NoSuchKey"), "p", msg()),
            Error::NotFound(_)
        ));
        assert!(matches!(classify(Some(304), None, "p", msg()), Error::NotModified(_)));
        assert!(matches!(
            classify(Some(412), None, "p", msg()),
            Error::PreconditionFailed(_)
        ));
        assert!(matches!(classify(Some(403), None, "p", msg()), Error::Auth(_)));
        assert!(matches!(
            classify(Some(400), Some("InvalidAccessKeyId"), "p", msg()),
            Error::Auth(_)
        ));
        assert!(matches!(classify(Some(500), None, "p", msg()), Error::Network(_)));
        assert!(matches!(classify(None, None, "p", msg()), Error::Network(_)));
    }

    #[test]
    fn test_timestamp_conversion() {
        let dt = DateTime::from_secs(1_700_000_000);
        let ts = to_timestamp(&dt);
        assert_eq!(ts.as_second(), 1_700_000_000);
        assert_eq!(to_date_time(ts), dt);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("charts/index.json"), "application/json");
        assert_eq!(content_type_for("charts/noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_read_chunk() {
        let mut reader: ObjectReader = Box::pin(&b"abcdefg"[..]);
        assert_eq!(read_chunk(&mut reader, 3).await.unwrap(), b"abc");
        assert_eq!(read_chunk(&mut reader, 3).await.unwrap(), b"def");
        assert_eq!(read_chunk(&mut reader, 3).await.unwrap(), b"g");
        assert!(read_chunk(&mut reader, 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_chunk_small_object_does_not_reserve_a_part() {
        let mut reader: ObjectReader = Box::pin(&b"tiny"[..]);
        let chunk = read_chunk(&mut reader, PART_SIZE).await.unwrap();
        assert_eq!(chunk, b"tiny");
        assert!(chunk.capacity() <= INITIAL_CHUNK_CAPACITY);
    }

    #[tokio::test]
    async fn test_from_config_rejects_local() {
        let config = BackendConfig::Local {
            root_directory: "/tmp".into(),
        };
        assert!(matches!(
            S3Backend::from_config(&config).await,
            Err(Error::Config(_))
        ));
    }
}
