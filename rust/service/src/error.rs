// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for the ingestion service.

use thiserror::Error;

/// Result type for orchestrated ingestion calls.
pub type Result<T> = std::result::Result<T, IngestError>;

/// Failure of a single remote parsing-service operation.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("{operation}: request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: service returned HTTP {status}: {body}")]
    Status {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("{operation}: invalid response body ({message}): {body}")]
    Decode {
        operation: &'static str,
        message: String,
        body: String,
    },

    #[error("{operation}: service reported failure [{}]: {message}", .code.as_deref().unwrap_or("UNSPECIFIED"))]
    Service {
        operation: &'static str,
        code: Option<String>,
        message: String,
    },

    #[error("{operation}: invalid request: {message}")]
    Request {
        operation: &'static str,
        message: String,
    },

    #[error("{operation}: cancelled")]
    Cancelled { operation: &'static str },
}

impl RemoteError {
    /// Remote operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            RemoteError::Transport { operation, .. }
            | RemoteError::Status { operation, .. }
            | RemoteError::Decode { operation, .. }
            | RemoteError::Service { operation, .. }
            | RemoteError::Request { operation, .. }
            | RemoteError::Cancelled { operation } => *operation,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RemoteError::Cancelled { .. })
    }

    /// HTTP status for `Status` failures.
    pub fn status(&self) -> Option<u16> {
        match self {
            RemoteError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Error code reported by the service for `Service` failures.
    pub fn service_code(&self) -> Option<&str> {
        match self {
            RemoteError::Service { code, .. } => code.as_deref(),
            _ => None,
        }
    }

    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            RemoteError::Transport { .. } => "REMOTE_TRANSPORT",
            RemoteError::Status { .. } => "REMOTE_STATUS",
            RemoteError::Decode { .. } => "REMOTE_DECODE",
            RemoteError::Service { .. } => "REMOTE_SERVICE",
            RemoteError::Request { .. } => "REMOTE_REQUEST",
            RemoteError::Cancelled { .. } => "CANCELLED",
        }
    }
}

/// Errors surfaced by [`crate::IfcService`].
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Native(#[from] ifc_ingest_core::Error),

    #[error("No IFC parser available: {reason}")]
    NoParserAvailable { reason: &'static str },

    #[error("{operation} requires the remote IFC service, which is disabled")]
    RemoteOnly { operation: &'static str },

    #[error("{operation} rejected: circuit breaker is open")]
    CircuitOpen { operation: &'static str },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Fallback parser task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl IngestError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            IngestError::Remote(err) => err.code(),
            IngestError::Native(err) => err.code(),
            IngestError::NoParserAvailable { .. } => "NO_PARSER_AVAILABLE",
            IngestError::RemoteOnly { .. } => "REMOTE_ONLY",
            IngestError::CircuitOpen { .. } => "CIRCUIT_OPEN",
            IngestError::Cancelled => "CANCELLED",
            IngestError::Join(_) => "TASK_ERROR",
        }
    }

    /// Component the error originated in.
    pub fn component(&self) -> &'static str {
        match self {
            IngestError::Remote(_) | IngestError::CircuitOpen { .. } => "remote",
            IngestError::Native(_) | IngestError::Join(_) => "native",
            IngestError::NoParserAvailable { .. }
            | IngestError::RemoteOnly { .. }
            | IngestError::Cancelled => "service",
        }
    }
}

/// Invalid configuration value.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid duration: {0:?}")]
    InvalidDuration(String),

    #[error("Invalid size: {0:?}")]
    InvalidSize(String),

    #[error("Invalid boolean: {0:?}")]
    InvalidBool(String),
}

/// Result cache failure. Never fails an ingestion call.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache store error: {0}")]
    Store(#[from] cacache::Error),

    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
