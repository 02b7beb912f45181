//! S3-compatible object store.
//!
//! Works against AWS S3 and path-style services like MinIO. Backend
//! faults translate into exactly three kinds — `NotFound`, `Unavailable`
//! (retryable) and `Validation` (non-retryable invalid request) — and no
//! retry happens here; retry policy belongs to callers.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream as S3ByteStream;
use bytes::Bytes;
use tokio_util::io::ReaderStream;
use tracing::debug;

use coffer_core::config::storage::S3StorageConfig;
use coffer_core::error::{AppError, ErrorKind};
use coffer_core::result::AppResult;
use coffer_core::traits::object_store::{
    ByteRange, ByteStream, ObjectInfo, ObjectStore, PutOutcome,
};

/// S3-compatible object store.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
}

/// Classification of a backend fault.
enum FaultClass {
    NotFound,
    Unavailable,
    Invalid,
}

impl S3ObjectStore {
    /// Connect using the configured endpoint, region, and credentials.
    pub async fn connect(config: &S3StorageConfig) -> AppResult<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if !config.access_key.is_empty() {
            loader = loader.credentials_provider(Credentials::new(
                config.access_key.clone(),
                config.secret_key.clone(),
                None,
                None,
                "coffer",
            ));
        }
        if !config.endpoint.is_empty() {
            loader = loader.endpoint_url(config.endpoint.clone());
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
        })
    }

    /// Classify an SDK error without consuming it.
    fn classify<E>(err: &SdkError<E>) -> FaultClass
    where
        E: ProvideErrorMetadata,
    {
        match err {
            SdkError::TimeoutError(_)
            | SdkError::DispatchFailure(_)
            | SdkError::ResponseError(_) => FaultClass::Unavailable,
            SdkError::ServiceError(ctx) => {
                let status = ctx.raw().status().as_u16();
                let code = ctx.err().code().unwrap_or("");
                if status == 404 || matches!(code, "NoSuchKey" | "NoSuchBucket" | "NotFound") {
                    FaultClass::NotFound
                } else if status >= 500
                    || matches!(
                        code,
                        "SlowDown" | "ServiceUnavailable" | "InternalError" | "RequestTimeout"
                    )
                {
                    FaultClass::Unavailable
                } else {
                    FaultClass::Invalid
                }
            }
            _ => FaultClass::Invalid,
        }
    }

    /// Translate an SDK error into the engine taxonomy.
    fn translate<E>(op: &str, target: String, err: SdkError<E>) -> AppError
    where
        E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    {
        match Self::classify(&err) {
            FaultClass::NotFound => AppError::not_found(format!("{op} {target}: not found")),
            FaultClass::Unavailable => AppError::with_source(
                ErrorKind::Unavailable,
                format!("{op} {target}: backend unavailable"),
                err,
            ),
            FaultClass::Invalid => {
                let code = err.code().unwrap_or("unknown").to_string();
                AppError::with_source(
                    ErrorKind::Validation,
                    format!("{op} {target}: rejected by backend ({code})"),
                    err,
                )
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    fn provider_type(&self) -> &str {
        "s3"
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(self.client.list_buckets().send().await.is_ok())
    }

    async fn create_bucket(&self, bucket: &str) -> AppResult<()> {
        let started = Instant::now();
        let result = self.client.create_bucket().bucket(bucket).send().await;
        debug!(
            bucket,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "s3.create_bucket"
        );
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                // Idempotent: an existing bucket is success.
                if matches!(
                    e.code(),
                    Some("BucketAlreadyOwnedByYou" | "BucketAlreadyExists")
                ) {
                    Ok(())
                } else {
                    Err(Self::translate("create_bucket", bucket.to_string(), e))
                }
            }
        }
    }

    async fn delete_bucket(&self, bucket: &str) -> AppResult<()> {
        let started = Instant::now();
        let result = self.client.delete_bucket().bucket(bucket).send().await;
        debug!(
            bucket,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "s3.delete_bucket"
        );
        result
            .map(|_| ())
            .map_err(|e| Self::translate("delete_bucket", bucket.to_string(), e))
    }

    async fn bucket_exists(&self, bucket: &str) -> AppResult<bool> {
        let started = Instant::now();
        let result = self.client.head_bucket().bucket(bucket).send().await;
        debug!(
            bucket,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "s3.bucket_exists"
        );
        match result {
            Ok(_) => Ok(true),
            Err(e) => match Self::classify(&e) {
                FaultClass::NotFound => Ok(false),
                _ => Err(Self::translate("head_bucket", bucket.to_string(), e)),
            },
        }
    }

    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
        metadata: Option<&HashMap<String, String>>,
    ) -> AppResult<PutOutcome> {
        let started = Instant::now();
        let bytes = data.len();
        let mut req = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(S3ByteStream::from(data));
        if let Some(ct) = content_type {
            req = req.content_type(ct);
        }
        if let Some(meta) = metadata {
            for (k, v) in meta {
                req = req.metadata(k, v);
            }
        }

        let result = req.send().await;
        debug!(
            bucket,
            key,
            bytes,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "s3.put"
        );
        let out = result.map_err(|e| Self::translate("put", format!("{bucket}/{key}"), e))?;

        Ok(PutOutcome {
            key: key.to_string(),
            etag: out.e_tag().map(str::to_string),
        })
    }

    async fn get(
        &self,
        bucket: &str,
        key: &str,
        range: Option<ByteRange>,
    ) -> AppResult<ByteStream> {
        let started = Instant::now();
        let mut req = self.client.get_object().bucket(bucket).key(key);
        if let Some(range) = range {
            req = req.range(range.to_header());
        }

        let result = req.send().await;
        debug!(
            bucket,
            key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "s3.get"
        );
        let out = result.map_err(|e| Self::translate("get", format!("{bucket}/{key}"), e))?;

        Ok(Box::pin(ReaderStream::new(out.body.into_async_read())))
    }

    async fn get_bytes(&self, bucket: &str, key: &str) -> AppResult<Bytes> {
        let started = Instant::now();
        let result = self.client.get_object().bucket(bucket).key(key).send().await;
        debug!(
            bucket,
            key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "s3.get_bytes"
        );
        let out = result.map_err(|e| Self::translate("get", format!("{bucket}/{key}"), e))?;

        let aggregated = out.body.collect().await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Unavailable,
                format!("get {bucket}/{key}: body read failed"),
                e,
            )
        })?;
        Ok(aggregated.into_bytes())
    }

    async fn remove(&self, bucket: &str, key: &str) -> AppResult<()> {
        let started = Instant::now();
        let result = self
            .client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;
        debug!(
            bucket,
            key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "s3.remove"
        );
        result
            .map(|_| ())
            .map_err(|e| Self::translate("remove", format!("{bucket}/{key}"), e))
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        recursive: bool,
    ) -> AppResult<Vec<ObjectInfo>> {
        let started = Instant::now();
        let mut req = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
        if !recursive {
            req = req.delimiter("/");
        }

        let mut objects = Vec::new();
        let mut pages = req.into_paginator().send();
        while let Some(page) = pages.next().await {
            let page =
                page.map_err(|e| Self::translate("list", format!("{bucket}/{prefix}"), e))?;
            for obj in page.contents() {
                objects.push(ObjectInfo {
                    key: obj.key().unwrap_or_default().to_string(),
                    size_bytes: obj.size().unwrap_or(0).max(0) as u64,
                    etag: obj.e_tag().map(str::to_string),
                    last_modified: obj.last_modified().and_then(|t| {
                        chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())
                    }),
                });
            }
            for common in page.common_prefixes() {
                if let Some(p) = common.prefix() {
                    objects.push(ObjectInfo {
                        key: p.to_string(),
                        size_bytes: 0,
                        etag: None,
                        last_modified: None,
                    });
                }
            }
        }
        objects.sort_by(|a, b| a.key.cmp(&b.key));

        debug!(
            bucket,
            prefix,
            count = objects.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "s3.list"
        );
        Ok(objects)
    }

    async fn stat(&self, bucket: &str, key: &str) -> AppResult<ObjectInfo> {
        let started = Instant::now();
        let result = self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;
        debug!(
            bucket,
            key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "s3.stat"
        );
        let out = result.map_err(|e| Self::translate("stat", format!("{bucket}/{key}"), e))?;

        Ok(ObjectInfo {
            key: key.to_string(),
            size_bytes: out.content_length().unwrap_or(0).max(0) as u64,
            etag: out.e_tag().map(str::to_string),
            last_modified: out
                .last_modified()
                .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
        })
    }

    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires_in: Duration,
    ) -> AppResult<String> {
        let started = Instant::now();
        let presign_config = PresigningConfig::expires_in(expires_in)
            .map_err(|e| AppError::validation(format!("Invalid presign expiry: {e}")))?;

        let result = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(presign_config)
            .await;
        debug!(
            bucket,
            key,
            elapsed_ms = started.elapsed().as_millis() as u64,
            ok = result.is_ok(),
            "s3.presign_get"
        );
        let presigned =
            result.map_err(|e| Self::translate("presign", format!("{bucket}/{key}"), e))?;

        Ok(presigned.uri().to_string())
    }
}
