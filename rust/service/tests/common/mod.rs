// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Shared fixtures: IFC samples, a scripted remote double and an HTTP mock.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use ifc_ingest_core::{EntityCounts, Metadata, ParseResult, ValidationResult};
use ifc_ingest_service::{
    HealthStatus, IfcRemote, MetricsResult, RemoteError, SpatialBoundsResult,
    SpatialQueryRequest, SpatialQueryResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const SAMPLE_IFC: &str = "ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('sample.ifc','2024-01-01T00:00:00',(''),(''),'','','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('0YvctVUKr0kugbFTf53O9L',$,'Sample',$,$,$,$,$,$);
#2=IFCBUILDING('2FCZDorxHDT8NI01kdXi8P',$,'Main',$,$,$,$,$,.ELEMENT.,$,$,$);
#3=IFCSPACE('0BTBFw6f90Nfh9rP1dlXrb',$,'101',$,$,$,$,$,.ELEMENT.,.INTERNAL.,$);
#4=IFCWALL('3vB2YO$MX4xv5uCqZZG05x',$,'Wall-1',$,$,$,$,$,$);
ENDSEC;
END-ISO-10303-21;
";

pub fn sample() -> Bytes {
    Bytes::from_static(SAMPLE_IFC.as_bytes())
}

pub fn not_ifc() -> Bytes {
    Bytes::from_static(b"Not an IFC file")
}

/// Building count the fake remote reports, distinct from the sample's.
pub const REMOTE_BUILDINGS: usize = 42;

/// How [`FakeRemote`] answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    /// HTTP 500.
    FailStatus,
    /// `success: false` with a typed code.
    FailService,
    /// Succeed after a delay, unless cancelled first.
    Slow(Duration),
    /// Never answer; return `Cancelled` once the token fires.
    Hang,
}

/// Scripted [`IfcRemote`] that counts calls.
#[derive(Debug)]
pub struct FakeRemote {
    behavior: Mutex<Behavior>,
    calls: AtomicUsize,
}

impl FakeRemote {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            behavior: Mutex::new(behavior),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set(&self, behavior: Behavior) {
        *self.behavior.lock().unwrap() = behavior;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(
        &self,
        operation: &'static str,
        cancel: &CancellationToken,
    ) -> Result<(), RemoteError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = *self.behavior.lock().unwrap();
        match behavior {
            Behavior::Succeed => Ok(()),
            Behavior::FailStatus => Err(RemoteError::Status {
                operation,
                status: 500,
                body: "internal error".into(),
            }),
            Behavior::FailService => Err(RemoteError::Service {
                operation,
                code: Some("PARSE_FAILED".into()),
                message: "unexpected token".into(),
            }),
            Behavior::Slow(delay) => tokio::select! {
                _ = cancel.cancelled() => Err(RemoteError::Cancelled { operation }),
                _ = tokio::time::sleep(delay) => Ok(()),
            },
            Behavior::Hang => {
                cancel.cancelled().await;
                Err(RemoteError::Cancelled { operation })
            }
        }
    }
}

pub fn remote_parse_result() -> ParseResult {
    let counts = EntityCounts {
        buildings: REMOTE_BUILDINGS,
        ..Default::default()
    };
    ParseResult::from_counts(counts, Vec::new(), Metadata::default())
}

#[async_trait]
impl IfcRemote for FakeRemote {
    async fn parse_ifc(
        &self,
        _data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<ParseResult, RemoteError> {
        self.respond("parse", cancel).await?;
        Ok(remote_parse_result())
    }

    async fn validate_ifc(
        &self,
        _data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<ValidationResult, RemoteError> {
        self.respond("validate", cancel).await?;
        Ok(ValidationResult {
            warnings: vec!["checked remotely".into()],
            ..Default::default()
        })
    }

    async fn health(&self, cancel: &CancellationToken) -> Result<HealthStatus, RemoteError> {
        self.respond("health", cancel).await?;
        Ok(HealthStatus {
            status: "healthy".into(),
            ..Default::default()
        })
    }

    async fn spatial_query(
        &self,
        _data: Bytes,
        request: &SpatialQueryRequest,
        cancel: &CancellationToken,
    ) -> Result<SpatialQueryResult, RemoteError> {
        self.respond("spatial_query", cancel).await?;
        Ok(SpatialQueryResult {
            query_type: request.query_type.clone(),
            ..Default::default()
        })
    }

    async fn spatial_bounds(
        &self,
        _data: Bytes,
        cancel: &CancellationToken,
    ) -> Result<SpatialBoundsResult, RemoteError> {
        self.respond("spatial_bounds", cancel).await?;
        Ok(SpatialBoundsResult::default())
    }

    async fn metrics(&self, cancel: &CancellationToken) -> Result<MetricsResult, RemoteError> {
        self.respond("metrics", cancel).await?;
        Ok(MetricsResult::default())
    }
}

/// Request counter shared with mock handlers.
pub type Hits = Arc<AtomicUsize>;

pub fn hits() -> Hits {
    Arc::new(AtomicUsize::new(0))
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Base URL of a port nothing listens on.
pub async fn unreachable_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
