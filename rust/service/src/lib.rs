// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC Ingest Service
//!
//! Resilient ingestion of IFC files: a remote parsing service is tried
//! first, guarded by a circuit breaker, with the native parser from
//! [`ifc_ingest_core`] as the fallback.
//!
//! - [`IfcService`]: the orchestrator
//! - [`IfcRemote`] / [`IfcServiceClient`]: the remote service capability and its HTTP client
//! - [`CircuitBreaker`]: Closed / Open / HalfOpen gate shared by all callers
//! - [`IngestConfig`]: environment-driven configuration
//! - [`Logger`]: injected logging capability
//!
//! ## Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use ifc_ingest_service::{IfcService, IngestConfig, TracingLogger};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> ifc_ingest_service::Result<()> {
//! let config = IngestConfig::from_env();
//! let service = IfcService::from_config(&config, TracingLogger::shared()).await?;
//!
//! let data = Bytes::from(std::fs::read("model.ifc").unwrap());
//! let result = service.parse_ifc(data, &CancellationToken::new()).await?;
//! println!("{} buildings", result.counts.buildings);
//! # Ok(())
//! # }
//! ```

pub mod breaker;
pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod remote;
pub mod service;

pub use breaker::{BreakerPermit, BreakerSnapshot, CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use cache::ResultCache;
pub use config::{parse_duration, parse_size, IngestConfig};
pub use error::{CacheError, ConfigError, IngestError, RemoteError, Result};
pub use logging::{LogEvent, LogLevel, LogRecord, Logger, MemoryLogger, TracingLogger};
pub use remote::{
    BoundingBox, HealthStatus, IfcRemote, IfcServiceClient, MetricsResult, RemoteClientConfig,
    SpatialBoundsResult, SpatialQueryRequest, SpatialQueryResult,
};
pub use service::{IfcService, ServiceOptions, ServiceStatus};

pub use ifc_ingest_core::{NativeParser, ParseResult, ValidationResult};
