// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ingestion orchestrator.
//!
//! [`IfcService`] composes the remote client, the circuit breaker and the
//! native parser. For `parse_ifc` and `validate_ifc`:
//!
//! 1. When the service is enabled and the breaker admits the call, the
//!    remote client is tried. Its outcome is recorded in the breaker.
//! 2. Otherwise, or after a remote failure, the native parser runs when the
//!    fallback is enabled and its outcome is returned unmodified.
//! 3. With neither path usable the call fails with
//!    [`IngestError::NoParserAvailable`]. A remote failure with the fallback
//!    disabled is relayed as is.
//!
//! Cancellation is never a remote fault: it is not recorded in the breaker
//! and does not trigger the fallback.

use crate::breaker::{BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig};
use crate::cache::ResultCache;
use crate::config::IngestConfig;
use crate::error::{IngestError, RemoteError, Result};
use crate::logging::{LogEvent, Logger};
use crate::remote::{
    HealthStatus, IfcRemote, IfcServiceClient, MetricsResult, SpatialBoundsResult,
    SpatialQueryRequest, SpatialQueryResult,
};
use bytes::Bytes;
use futures::future::BoxFuture;
use ifc_ingest_core::{NativeParser, ParseResult, ValidationResult};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Orchestrator switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceOptions {
    /// Try the remote parsing service first.
    pub service_enabled: bool,
    /// Use the native parser when the remote path is unusable.
    pub fallback_enabled: bool,
    pub breaker: CircuitBreakerConfig,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            service_enabled: true,
            fallback_enabled: true,
            breaker: CircuitBreakerConfig::default(),
        }
    }
}

/// Orchestrator status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceStatus {
    pub service_enabled: bool,
    pub fallback_enabled: bool,
    /// Remote readiness, or `None` when the service is disabled.
    pub remote_available: Option<bool>,
    pub breaker: BreakerSnapshot,
    pub cache_enabled: bool,
    pub max_file_size: u64,
}

/// An operation with both a remote and a native implementation.
trait Ingest: Serialize + DeserializeOwned + Send + 'static {
    const OPERATION: &'static str;

    fn remote<'a>(
        remote: &'a dyn IfcRemote,
        data: Bytes,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, std::result::Result<Self, RemoteError>>;

    fn native(parser: &NativeParser, data: &[u8]) -> ifc_ingest_core::Result<Self>;
}

impl Ingest for ParseResult {
    const OPERATION: &'static str = "parse";

    fn remote<'a>(
        remote: &'a dyn IfcRemote,
        data: Bytes,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, std::result::Result<Self, RemoteError>> {
        remote.parse_ifc(data, cancel)
    }

    fn native(parser: &NativeParser, data: &[u8]) -> ifc_ingest_core::Result<Self> {
        parser.parse_ifc(data)
    }
}

impl Ingest for ValidationResult {
    const OPERATION: &'static str = "validate";

    fn remote<'a>(
        remote: &'a dyn IfcRemote,
        data: Bytes,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, std::result::Result<Self, RemoteError>> {
        remote.validate_ifc(data, cancel)
    }

    fn native(parser: &NativeParser, data: &[u8]) -> ifc_ingest_core::Result<Self> {
        parser.validate_ifc(data)
    }
}

/// Resilient IFC ingestion: remote service first, native parser as fallback.
pub struct IfcService {
    remote: Arc<dyn IfcRemote>,
    native: NativeParser,
    options: ServiceOptions,
    breaker: CircuitBreaker,
    logger: Arc<dyn Logger>,
    cache: Option<ResultCache>,
}

impl IfcService {
    pub fn new(
        remote: Arc<dyn IfcRemote>,
        native: NativeParser,
        options: ServiceOptions,
        logger: Arc<dyn Logger>,
    ) -> Self {
        let breaker = CircuitBreaker::new(options.breaker.clone());
        Self {
            remote,
            native,
            options,
            breaker,
            logger,
            cache: None,
        }
    }

    /// Build the HTTP client, native parser and (if enabled) the result cache
    /// from `config`. A cache that cannot be opened is logged and skipped.
    pub async fn from_config(config: &IngestConfig, logger: Arc<dyn Logger>) -> Result<Self> {
        let client = IfcServiceClient::new(config.remote_client(), logger.clone())?;
        let service = Self::new(
            Arc::new(client),
            NativeParser::new(config.max_file_size),
            config.service_options(),
            logger,
        );

        if !config.cache_enabled {
            return Ok(service);
        }
        match ResultCache::new(&config.cache_dir, config.cache_ttl).await {
            Ok(cache) => Ok(service.with_cache(cache)),
            Err(e) => {
                service.logger.warn(
                    LogEvent::new("Result cache unavailable, continuing without it")
                        .field("cache_dir", &config.cache_dir)
                        .field("error", &e),
                );
                Ok(service)
            }
        }
    }

    /// Cache successful remote results.
    pub fn with_cache(mut self, cache: ResultCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    /// Parse an IFC file.
    pub async fn parse_ifc(&self, data: Bytes, cancel: &CancellationToken) -> Result<ParseResult> {
        self.ingest(data, cancel).await
    }

    /// Validate an IFC file.
    pub async fn validate_ifc(
        &self,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult> {
        self.ingest(data, cancel).await
    }

    /// Remote health, gated by the breaker.
    pub async fn health(&self, cancel: &CancellationToken) -> Result<HealthStatus> {
        self.gated("health", |remote| remote.health(cancel)).await
    }

    /// Spatial query. Remote only; there is no native equivalent.
    pub async fn spatial_query(
        &self,
        data: Bytes,
        request: &SpatialQueryRequest,
        cancel: &CancellationToken,
    ) -> Result<SpatialQueryResult> {
        self.gated("spatial_query", |remote| {
            remote.spatial_query(data, request, cancel)
        })
        .await
    }

    /// Model bounds. Remote only.
    pub async fn spatial_bounds(
        &self,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<SpatialBoundsResult> {
        self.gated("spatial_bounds", |remote| remote.spatial_bounds(data, cancel))
            .await
    }

    /// Remote service metrics.
    pub async fn metrics(&self, cancel: &CancellationToken) -> Result<MetricsResult> {
        self.gated("metrics", |remote| remote.metrics(cancel)).await
    }

    /// Flags, breaker snapshot and remote readiness. The readiness probe is
    /// not recorded in the breaker.
    pub async fn status(&self, cancel: &CancellationToken) -> ServiceStatus {
        let remote_available = if self.options.service_enabled {
            Some(self.remote.is_available(cancel).await)
        } else {
            None
        };

        ServiceStatus {
            service_enabled: self.options.service_enabled,
            fallback_enabled: self.options.fallback_enabled,
            remote_available,
            breaker: self.breaker.snapshot(),
            cache_enabled: self.cache.is_some(),
            max_file_size: self.native.max_file_size(),
        }
    }

    async fn ingest<T: Ingest>(&self, data: Bytes, cancel: &CancellationToken) -> Result<T> {
        let operation = T::OPERATION;
        if cancel.is_cancelled() {
            return Err(IngestError::Cancelled);
        }
        if !self.options.service_enabled && !self.options.fallback_enabled {
            return Err(self.no_parser(
                operation,
                "remote service and fallback parser are both disabled",
            ));
        }

        let size = data.len() as u64;
        if size > self.native.max_file_size() {
            self.logger.warn(
                LogEvent::new("IFC input exceeds size limit")
                    .field("operation", operation)
                    .field("size", size)
                    .field("max", self.native.max_file_size()),
            );
            return Err(ifc_ingest_core::Error::FileTooLarge {
                size,
                max: self.native.max_file_size(),
            }
            .into());
        }

        let mut remote_error = None;
        if self.options.service_enabled {
            let key = self.cache.as_ref().map(|_| ResultCache::key(operation, &data));
            if let Some(hit) = self.cached::<T>(key.as_deref()).await {
                return Ok(hit);
            }

            match self.breaker.try_acquire() {
                Some(permit) => {
                    let started = Instant::now();
                    self.logger.info(
                        LogEvent::new("Attempting remote IFC service")
                            .field("service", "ifc-remote")
                            .field("operation", operation)
                            .field("size", size)
                            .field("probe", permit.is_probe()),
                    );

                    match T::remote(self.remote.as_ref(), data.clone(), cancel).await {
                        Ok(result) => {
                            permit.success();
                            self.logger.info(
                                LogEvent::new("Remote IFC service succeeded")
                                    .field("service", "ifc-remote")
                                    .field("operation", operation)
                                    .field("duration_ms", started.elapsed().as_millis()),
                            );
                            self.store(key.as_deref(), &result).await;
                            return Ok(result);
                        }
                        Err(err) if err.is_cancelled() => {
                            drop(permit);
                            self.logger.info(
                                LogEvent::new("Remote IFC request cancelled")
                                    .field("operation", operation),
                            );
                            return Err(IngestError::Cancelled);
                        }
                        Err(err) => {
                            permit.failure();
                            self.logger.warn(
                                LogEvent::new("Remote IFC service failed")
                                    .field("service", "ifc-remote")
                                    .field("operation", operation)
                                    .field("duration_ms", started.elapsed().as_millis())
                                    .field("error_code", err.code())
                                    .field("error", &err)
                                    .field("breaker_state", self.breaker.state()),
                            );
                            remote_error = Some(err);
                        }
                    }
                }
                None => {
                    self.logger.warn(
                        LogEvent::new("Circuit breaker open, skipping remote IFC service")
                            .field("service", "ifc-remote")
                            .field("operation", operation),
                    );
                }
            }
        }

        if self.options.fallback_enabled {
            let reason = if !self.options.service_enabled {
                "service_disabled"
            } else if remote_error.is_some() {
                "remote_failed"
            } else {
                "circuit_open"
            };
            self.logger.info(
                LogEvent::new("Falling back to native IFC parser")
                    .field("operation", operation)
                    .field("reason", reason),
            );
            return self.run_native::<T>(data, cancel).await;
        }

        if let Some(err) = remote_error {
            return Err(err.into());
        }

        Err(self.no_parser(
            operation,
            "circuit breaker is open and the fallback parser is disabled",
        ))
    }

    fn no_parser(&self, operation: &'static str, reason: &'static str) -> IngestError {
        self.logger.error(
            LogEvent::new("No IFC parser available")
                .field("operation", operation)
                .field("reason", reason),
        );
        IngestError::NoParserAvailable { reason }
    }

    /// Run the CPU-bound native parser on the blocking pool.
    async fn run_native<T: Ingest>(&self, data: Bytes, cancel: &CancellationToken) -> Result<T> {
        let parser = self.native.clone();
        let task = tokio::task::spawn_blocking(move || T::native(&parser, &data));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(IngestError::Cancelled),
            joined = task => Ok(joined??),
        }
    }

    /// Remote-only call admitted by the breaker.
    async fn gated<'a, T, F, Fut>(&'a self, operation: &'static str, call: F) -> Result<T>
    where
        F: FnOnce(&'a dyn IfcRemote) -> Fut,
        Fut: Future<Output = std::result::Result<T, RemoteError>>,
    {
        if !self.options.service_enabled {
            return Err(IngestError::RemoteOnly { operation });
        }
        let Some(permit) = self.breaker.try_acquire() else {
            self.logger.warn(
                LogEvent::new("Circuit breaker open, rejecting remote-only operation")
                    .field("service", "ifc-remote")
                    .field("operation", operation),
            );
            return Err(IngestError::CircuitOpen { operation });
        };

        match call(self.remote.as_ref()).await {
            Ok(value) => {
                permit.success();
                Ok(value)
            }
            Err(err) if err.is_cancelled() => Err(IngestError::Cancelled),
            Err(err) => {
                permit.failure();
                self.logger.warn(
                    LogEvent::new("Remote IFC service failed")
                        .field("service", "ifc-remote")
                        .field("operation", operation)
                        .field("error_code", err.code())
                        .field("error", &err)
                        .field("breaker_state", self.breaker.state()),
                );
                Err(err.into())
            }
        }
    }

    async fn cached<T: DeserializeOwned>(&self, key: Option<&str>) -> Option<T> {
        let (cache, key) = self.cache.as_ref().zip(key)?;
        match cache.get::<T>(key).await {
            Ok(Some(value)) => {
                self.logger.debug(LogEvent::new("cache hit").field("key", key));
                Some(value)
            }
            Ok(None) => None,
            Err(e) => {
                self.logger.warn(
                    LogEvent::new("Result cache read failed")
                        .field("key", key)
                        .field("error", &e),
                );
                None
            }
        }
    }

    async fn store<T: Serialize>(&self, key: Option<&str>, value: &T) {
        let Some((cache, key)) = self.cache.as_ref().zip(key) else {
            return;
        };
        if let Err(e) = cache.set(key, value).await {
            self.logger.warn(
                LogEvent::new("Result cache write failed")
                    .field("key", key)
                    .field("error", &e),
            );
        }
    }
}
