// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Remote parsing service: capability trait, HTTP client and wire types.

pub mod client;
pub mod types;

pub use client::{IfcServiceClient, RemoteClientConfig};
pub use types::{
    BoundingBox, HealthStatus, MetricsResult, SpatialBoundsResult, SpatialQueryRequest,
    SpatialQueryResult,
};

use crate::error::RemoteError;
use async_trait::async_trait;
use bytes::Bytes;
use ifc_ingest_core::{ParseResult, ValidationResult};
use tokio_util::sync::CancellationToken;

/// Capabilities of the remote IFC parsing service.
///
/// Implemented by [`IfcServiceClient`] over HTTP and by test doubles; the
/// orchestrator only sees this trait. Every call aborts promptly once
/// `cancel` fires.
#[async_trait]
pub trait IfcRemote: Send + Sync {
    async fn parse_ifc(&self, data: Bytes, cancel: &CancellationToken) -> Result<ParseResult, RemoteError>;

    async fn validate_ifc(
        &self,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, RemoteError>;

    async fn health(&self, cancel: &CancellationToken) -> Result<HealthStatus, RemoteError>;

    /// Readiness probe: `health` with the response discarded.
    async fn is_available(&self, cancel: &CancellationToken) -> bool {
        self.health(cancel).await.is_ok()
    }

    async fn spatial_query(
        &self,
        data: Bytes,
        request: &SpatialQueryRequest,
        cancel: &CancellationToken,
    ) -> Result<SpatialQueryResult, RemoteError>;

    async fn spatial_bounds(
        &self,
        data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<SpatialBoundsResult, RemoteError>;

    async fn metrics(&self, cancel: &CancellationToken) -> Result<MetricsResult, RemoteError>;
}
