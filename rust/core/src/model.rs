// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Result and metadata types shared by the remote and native parsing paths.
//!
//! Both paths produce exactly these values, so callers never need to know
//! which parser served a request. The JSON layout matches the remote
//! parsing service; every field has a default so partial payloads decode.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Schema version reported when none can be detected.
pub const UNKNOWN_SCHEMA: &str = "Unknown";

/// Per-family entity counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityCounts {
    pub buildings: usize,
    pub spaces: usize,
    pub equipment: usize,
    pub walls: usize,
    pub doors: usize,
    pub windows: usize,
}

impl EntityCounts {
    /// Sum of all typed counts.
    pub fn total(&self) -> usize {
        self.buildings + self.spaces + self.equipment + self.walls + self.doors + self.windows
    }
}

/// A single entity record found in the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRecord {
    /// STEP instance number (`#id`).
    pub id: u32,
    /// Upper-case entity type name, e.g. `IFCWALL`.
    #[serde(alias = "type")]
    pub ifc_type: String,
    /// GlobalId attribute, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_id: Option<String>,
}

/// Processing metadata attached to every result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    /// Detected schema version ("IFC4", "IFC2X3", ...), or "Unknown".
    #[serde(alias = "ifc_version")]
    pub schema_version: String,
    /// Input size in bytes.
    pub file_size: u64,
    /// Time spent producing the result (ms).
    pub processing_time_ms: u64,
    /// UTC completion time.
    pub timestamp: DateTime<Utc>,
}

impl Metadata {
    /// Build metadata stamped with the current time.
    pub fn new(schema_version: impl Into<String>, file_size: u64, elapsed: Duration) -> Self {
        Self {
            schema_version: schema_version.into(),
            file_size,
            processing_time_ms: elapsed.as_millis() as u64,
            timestamp: Utc::now(),
        }
    }
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            schema_version: UNKNOWN_SCHEMA.to_string(),
            file_size: 0,
            processing_time_ms: 0,
            timestamp: Utc::now(),
        }
    }
}

/// Typed error payload carried by a failed result.
///
/// Accepts either a bare message string or a `{code, message}` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "ErrorDetailRepr")]
pub struct ErrorDetail {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

impl ErrorDetail {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ErrorDetailRepr {
    Message(String),
    Structured {
        #[serde(default)]
        code: Option<String>,
        #[serde(default, alias = "error", alias = "detail")]
        message: String,
    },
}

impl From<ErrorDetailRepr> for ErrorDetail {
    fn from(repr: ErrorDetailRepr) -> Self {
        match repr {
            ErrorDetailRepr::Message(message) => Self {
                code: None,
                message,
            },
            ErrorDetailRepr::Structured { code, message } => Self { code, message },
        }
    }
}

/// Outcome of parsing an IFC file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseResult {
    /// A payload without the flag decodes as a failure.
    #[serde(default)]
    pub success: bool,
    #[serde(flatten)]
    pub counts: EntityCounts,
    pub total_entities: usize,
    /// Entity detail. The remote service may omit it; the native parser
    /// fills it for the recognised entity families.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<EntityRecord>,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ParseResult {
    /// Successful result whose total is derived from the counts.
    pub fn from_counts(counts: EntityCounts, entities: Vec<EntityRecord>, metadata: Metadata) -> Self {
        Self {
            success: true,
            counts,
            total_entities: counts.total(),
            entities,
            metadata,
            error: None,
        }
    }

    /// True when a successful result's total matches its typed counts.
    pub fn is_consistent(&self) -> bool {
        !self.success || self.total_entities == self.counts.total()
    }
}

impl Default for ParseResult {
    fn default() -> Self {
        Self {
            success: true,
            counts: EntityCounts::default(),
            total_entities: 0,
            entities: Vec::new(),
            metadata: Metadata::default(),
            error: None,
        }
    }
}

/// Compliance verdicts computed during validation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComplianceFlags {
    /// Schema version belongs to a recognised IFC family.
    pub schema_family_match: bool,
    pub spatial_consistency: bool,
    pub data_integrity: bool,
}

/// Validation findings grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationIssues {
    pub schema: Vec<String>,
    pub spatial: Vec<String>,
    pub integrity: Vec<String>,
}

impl ValidationIssues {
    pub fn is_empty(&self) -> bool {
        self.schema.is_empty() && self.spatial.is_empty() && self.integrity.is_empty()
    }
}

/// Outcome of validating an IFC file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationResult {
    #[serde(default)]
    pub success: bool,
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
    pub compliance: ComplianceFlags,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issues: Option<ValidationIssues>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl ValidationResult {
    /// Successful validation; `valid` follows from whether any errors were found.
    pub fn from_findings(
        warnings: Vec<String>,
        errors: Vec<String>,
        compliance: ComplianceFlags,
        metadata: Metadata,
        issues: Option<ValidationIssues>,
    ) -> Self {
        Self {
            success: true,
            valid: errors.is_empty(),
            warnings,
            errors,
            compliance,
            metadata,
            issues,
            error: None,
        }
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            success: true,
            valid: true,
            warnings: Vec::new(),
            errors: Vec::new(),
            compliance: ComplianceFlags::default(),
            metadata: Metadata::default(),
            issues: None,
            error: None,
        }
    }
}
