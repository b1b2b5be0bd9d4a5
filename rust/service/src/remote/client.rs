// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! HTTP client for the remote IFC parsing service.

use super::types::{
    Envelope, HealthStatus, MetricsResult, SpatialBoundsResult, SpatialQueryRequest,
    SpatialQueryResult,
};
use super::IfcRemote;
use crate::error::RemoteError;
use crate::logging::{LogEvent, Logger};
use async_trait::async_trait;
use bytes::Bytes;
use ifc_ingest_core::{ParseResult, ValidationResult};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Header carrying JSON-encoded spatial query parameters.
pub const QUERY_PARAMS_HEADER: &str = "X-Query-Params";

/// Maximum number of response-body bytes kept in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Remote client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteClientConfig {
    /// Service base URL, e.g. `http://localhost:5000`.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Attempts made by retrying operations (spatial query/bounds, metrics).
    pub retries: u32,
    /// Linear backoff unit: attempt `n` is followed by an `n * backoff_step` pause.
    pub backoff_step: Duration,
    /// Also retry parse, validate and health. Off by default so a failing
    /// service trips the breaker and reaches the fallback quickly.
    pub retry_primary: bool,
}

impl Default for RemoteClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            timeout: Duration::from_secs(30),
            retries: 3,
            backoff_step: Duration::from_secs(1),
            retry_primary: false,
        }
    }
}

/// Retrying HTTP client for the remote IFC parsing service.
pub struct IfcServiceClient {
    config: RemoteClientConfig,
    http: reqwest::Client,
    logger: Arc<dyn Logger>,
}

impl IfcServiceClient {
    /// Create a client. Fails only if the HTTP stack cannot be initialised.
    pub fn new(mut config: RemoteClientConfig, logger: Arc<dyn Logger>) -> Result<Self, RemoteError> {
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|source| RemoteError::Transport {
                operation: "client_init",
                source,
            })?;

        Ok(Self {
            config,
            http,
            logger,
        })
    }

    pub fn config(&self) -> &RemoteClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn attempts(&self, retrying: bool) -> u32 {
        if retrying || self.config.retry_primary {
            self.config.retries.max(1)
        } else {
            1
        }
    }

    /// Run `build`'s request up to `attempts` times with linear backoff.
    async fn execute<T, F>(
        &self,
        operation: &'static str,
        attempts: u32,
        cancel: &CancellationToken,
        build: F,
    ) -> Result<T, RemoteError>
    where
        T: DeserializeOwned + Envelope + Send,
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 1;
        loop {
            let started = Instant::now();
            match self.attempt::<T>(operation, build(), cancel).await {
                Ok(value) => {
                    self.logger.debug(
                        LogEvent::new("Remote IFC request succeeded")
                            .field("service", "ifc-remote")
                            .field("operation", operation)
                            .field("attempt", attempt)
                            .field("duration_ms", started.elapsed().as_millis()),
                    );
                    return Ok(value);
                }
                Err(err) if err.is_cancelled() || attempt >= attempts => return Err(err),
                Err(err) => {
                    let delay = self.config.backoff_step * attempt;
                    self.logger.warn(
                        LogEvent::new("Remote IFC request failed, retrying")
                            .field("service", "ifc-remote")
                            .field("operation", operation)
                            .field("attempt", attempt)
                            .field("max_attempts", attempts)
                            .field("backoff_ms", delay.as_millis())
                            .field("error", &err),
                    );

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(RemoteError::Cancelled { operation }),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// One HTTP round trip: send, check status, decode, check `success`,
    /// reject payloads that break the result invariants.
    async fn attempt<T>(
        &self,
        operation: &'static str,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> Result<T, RemoteError>
    where
        T: DeserializeOwned + Envelope + Send,
    {
        let transport = |source| RemoteError::Transport { operation, source };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RemoteError::Cancelled { operation }),
            response = request.send() => response.map_err(transport)?,
        };

        let status = response.status();
        let body = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RemoteError::Cancelled { operation }),
            body = response.bytes() => body.map_err(transport)?,
        };

        if !status.is_success() {
            return Err(RemoteError::Status {
                operation,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        let value: T = serde_json::from_slice(&body).map_err(|e| RemoteError::Decode {
            operation,
            message: e.to_string(),
            body: truncate_body(&body),
        })?;

        if let Some(detail) = value.failure() {
            return Err(RemoteError::Service {
                operation,
                code: detail.code,
                message: detail.message,
            });
        }

        if let Some(message) = value.inconsistency() {
            return Err(RemoteError::Decode {
                operation,
                message,
                body: truncate_body(&body),
            });
        }

        Ok(value)
    }

    fn post_bytes(&self, path: &str, data: &Bytes) -> RequestBuilder {
        self.http
            .post(self.url(path))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(data.clone())
    }
}

#[async_trait]
impl IfcRemote for IfcServiceClient {
    async fn parse_ifc(&self, data: Bytes, cancel: &CancellationToken) -> Result<ParseResult, RemoteError> {
        self.execute("parse", self.attempts(false), cancel, || {
            self.post_bytes("/api/parse", &data)
        })
        .await
    }

    async fn validate_ifc(
        &self,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, RemoteError> {
        self.execute("validate", self.attempts(false), cancel, || {
            self.post_bytes("/api/validate", &data)
        })
        .await
    }

    async fn health(&self, cancel: &CancellationToken) -> Result<HealthStatus, RemoteError> {
        self.execute("health", self.attempts(false), cancel, || {
            self.http.get(self.url("/health"))
        })
        .await
    }

    async fn spatial_query(
        &self,
        data: Bytes,
        request: &SpatialQueryRequest,
        cancel: &CancellationToken,
    ) -> Result<SpatialQueryResult, RemoteError> {
        let operation = "spatial_query";
        let params = serde_json::to_string(request).map_err(|e| RemoteError::Request {
            operation,
            message: e.to_string(),
        })?;
        let header = HeaderValue::from_str(&params).map_err(|e| RemoteError::Request {
            operation,
            message: format!("query parameters are not a valid header value: {}", e),
        })?;

        self.execute(operation, self.attempts(true), cancel, || {
            self.post_bytes("/api/spatial/query", &data)
                .header(QUERY_PARAMS_HEADER, header.clone())
        })
        .await
    }

    async fn spatial_bounds(
        &self,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<SpatialBoundsResult, RemoteError> {
        self.execute("spatial_bounds", self.attempts(true), cancel, || {
            self.post_bytes("/api/spatial/bounds", &data)
        })
        .await
    }

    async fn metrics(&self, cancel: &CancellationToken) -> Result<MetricsResult, RemoteError> {
        self.execute("metrics", self.attempts(true), cancel, || {
            self.http.get(self.url("/metrics"))
        })
        .await
    }
}

/// Lossy UTF-8 view of `body`, cut to [`MAX_ERROR_BODY`] bytes on a char boundary.
fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_ERROR_BODY {
        return text.into_owned();
    }
    let mut end = MAX_ERROR_BODY;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... ({} bytes total)", &text[..end], body.len())
}
