// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Pass-through envelopes exchanged with the remote parsing service.
//!
//! Only the fields the ingestion layer inspects are typed; everything else
//! is preserved in `extra`.

use ifc_ingest_core::{ErrorDetail, ParseResult, ValidationResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_true() -> bool {
    true
}

/// `GET /health` response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub cache_enabled: bool,
    /// Reported as either a byte count or a human-readable size.
    pub max_file_size: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Spatial query parameters, sent JSON-encoded in `X-Query-Params`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpatialQueryRequest {
    pub query_type: String,
    #[serde(flatten)]
    pub params: Map<String, Value>,
}

impl SpatialQueryRequest {
    pub fn new(query_type: impl Into<String>) -> Self {
        Self {
            query_type: query_type.into(),
            params: Map::new(),
        }
    }

    /// Add a query parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// `POST /api/spatial/query` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialQueryResult {
    #[serde(default = "default_true")]
    pub success: bool,
    pub query_type: String,
    pub results: Vec<Value>,
    pub total_found: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SpatialQueryResult {
    fn default() -> Self {
        Self {
            success: true,
            query_type: String::new(),
            results: Vec::new(),
            total_found: 0,
            error: None,
            extra: Map::new(),
        }
    }
}

/// Axis-aligned model bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

/// `POST /api/spatial/bounds` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialBoundsResult {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for SpatialBoundsResult {
    fn default() -> Self {
        Self {
            success: true,
            bounding_box: None,
            error: None,
            extra: Map::new(),
        }
    }
}

/// `GET /metrics` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsResult {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    #[serde(flatten)]
    pub metrics: Map<String, Value>,
}

impl Default for MetricsResult {
    fn default() -> Self {
        Self {
            success: true,
            error: None,
            metrics: Map::new(),
        }
    }
}

/// Responses carrying a logical `success` flag.
pub(crate) trait Envelope {
    /// Failure reported inside an HTTP-successful response.
    fn failure(&self) -> Option<ErrorDetail>;

    /// Payload that decoded but breaks an invariant of the result type.
    fn inconsistency(&self) -> Option<String> {
        None
    }
}

/// A response is a failure when the flag is false or an error is attached.
fn reported_failure(success: bool, error: &Option<ErrorDetail>) -> Option<ErrorDetail> {
    match error {
        Some(detail) => Some(detail.clone()),
        None if success => None,
        None => Some(ErrorDetail {
            code: None,
            message: "service did not report success".to_string(),
        }),
    }
}

impl Envelope for ParseResult {
    fn failure(&self) -> Option<ErrorDetail> {
        reported_failure(self.success, &self.error)
    }

    fn inconsistency(&self) -> Option<String> {
        if self.is_consistent() {
            return None;
        }
        Some(format!(
            "total_entities {} does not match the typed counts ({})",
            self.total_entities,
            self.counts.total()
        ))
    }
}

impl Envelope for ValidationResult {
    fn failure(&self) -> Option<ErrorDetail> {
        reported_failure(self.success, &self.error)
    }
}

impl Envelope for SpatialQueryResult {
    fn failure(&self) -> Option<ErrorDetail> {
        reported_failure(self.success, &self.error)
    }
}

impl Envelope for SpatialBoundsResult {
    fn failure(&self) -> Option<ErrorDetail> {
        reported_failure(self.success, &self.error)
    }
}

impl Envelope for MetricsResult {
    fn failure(&self) -> Option<ErrorDetail> {
        reported_failure(self.success, &self.error)
    }
}

impl Envelope for HealthStatus {
    fn failure(&self) -> Option<ErrorDetail> {
        None
    }
}
