// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Orchestrator decisions over a scripted remote.

mod common;

use common::{not_ifc, sample, Behavior, FakeRemote, REMOTE_BUILDINGS};
use ifc_ingest_core::NativeParser;
use ifc_ingest_service::{
    CircuitBreakerConfig, CircuitState, IfcService, IngestError, LogLevel, MemoryLogger,
    RemoteError, ResultCache, ServiceOptions, SpatialQueryRequest,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const MAX_FILE_SIZE: u64 = 1024 * 1024;

struct Harness {
    service: IfcService,
    remote: Arc<FakeRemote>,
    logger: Arc<MemoryLogger>,
}

fn options(service_enabled: bool, fallback_enabled: bool, threshold: u32) -> ServiceOptions {
    ServiceOptions {
        service_enabled,
        fallback_enabled,
        breaker: CircuitBreakerConfig {
            enabled: true,
            failure_threshold: threshold,
            recovery_timeout: Duration::from_secs(60),
        },
    }
}

fn harness(behavior: Behavior, options: ServiceOptions) -> Harness {
    let remote = FakeRemote::new(behavior);
    let logger = MemoryLogger::new();
    let service = IfcService::new(
        remote.clone(),
        NativeParser::new(MAX_FILE_SIZE),
        options,
        logger.clone(),
    );
    Harness {
        service,
        remote,
        logger,
    }
}

#[tokio::test]
async fn test_remote_success_is_returned() {
    let h = harness(Behavior::Succeed, options(true, true, 3));
    let result = h
        .service
        .parse_ifc(sample(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.counts.buildings, REMOTE_BUILDINGS);
    assert_eq!(h.remote.calls(), 1);
    assert!(h.logger.contains("Attempting remote IFC service"));
    assert!(h.logger.contains("Remote IFC service succeeded"));
    assert!(!h.logger.contains("Falling back"));
}

#[tokio::test]
async fn test_remote_failure_falls_back_to_native() {
    let h = harness(Behavior::FailStatus, options(true, true, 3));
    let result = h
        .service
        .parse_ifc(sample(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.success);
    assert_eq!(result.counts.buildings, 1);
    assert_eq!(result.counts.walls, 1);
    assert_eq!(result.metadata.schema_version, "IFC4");
    assert_eq!(h.service.breaker().consecutive_failures(), 1);

    let failed = h.logger.find("Remote IFC service failed");
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].level, LogLevel::Warn);
    assert_eq!(failed[0].event.get("error_code"), Some("REMOTE_STATUS"));
    let fallback = h.logger.find("Falling back to native IFC parser");
    assert_eq!(fallback[0].event.get("reason"), Some("remote_failed"));
}

#[tokio::test]
async fn test_logical_remote_failure_is_treated_like_transport_failure() {
    let h = harness(Behavior::FailService, options(true, true, 1));
    let result = h
        .service
        .validate_ifc(sample(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(result.valid);
    assert_eq!(h.service.breaker().state(), CircuitState::Open);
}

#[tokio::test]
async fn test_threshold_trips_and_skips_remote() {
    let h = harness(Behavior::FailStatus, options(true, true, 3));
    let cancel = CancellationToken::new();

    for _ in 0..3 {
        h.service.parse_ifc(sample(), &cancel).await.unwrap();
    }
    assert_eq!(h.service.breaker().state(), CircuitState::Open);
    assert_eq!(h.remote.calls(), 3);

    let result = h.service.parse_ifc(sample(), &cancel).await.unwrap();
    assert_eq!(result.counts.buildings, 1);
    assert_eq!(h.remote.calls(), 3);
    assert!(h
        .logger
        .contains("Circuit breaker open, skipping remote IFC service"));
}

#[tokio::test(start_paused = true)]
async fn test_half_open_probe_success_closes_breaker() {
    let h = harness(Behavior::FailStatus, options(true, true, 2));
    let cancel = CancellationToken::new();

    h.service.parse_ifc(sample(), &cancel).await.unwrap();
    h.service.parse_ifc(sample(), &cancel).await.unwrap();
    assert_eq!(h.service.breaker().state(), CircuitState::Open);

    h.remote.set(Behavior::Succeed);
    tokio::time::advance(Duration::from_secs(30)).await;
    h.service.parse_ifc(sample(), &cancel).await.unwrap();
    assert_eq!(h.remote.calls(), 2);

    tokio::time::advance(Duration::from_secs(31)).await;
    let result = h.service.parse_ifc(sample(), &cancel).await.unwrap();
    assert_eq!(result.counts.buildings, REMOTE_BUILDINGS);
    assert_eq!(h.remote.calls(), 3);
    assert_eq!(h.service.breaker().state(), CircuitState::Closed);
    assert_eq!(h.service.breaker().consecutive_failures(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_half_open_probe_failure_reopens_breaker() {
    let h = harness(Behavior::FailStatus, options(true, true, 1));
    let cancel = CancellationToken::new();

    h.service.parse_ifc(sample(), &cancel).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;

    h.service.parse_ifc(sample(), &cancel).await.unwrap();
    assert_eq!(h.remote.calls(), 2);
    assert_eq!(h.service.breaker().state(), CircuitState::Open);

    h.service.parse_ifc(sample(), &cancel).await.unwrap();
    assert_eq!(h.remote.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_share_single_probe() {
    let h = harness(Behavior::FailStatus, options(true, true, 1));
    let cancel = CancellationToken::new();

    h.service.parse_ifc(sample(), &cancel).await.unwrap();
    tokio::time::advance(Duration::from_secs(61)).await;
    h.remote.set(Behavior::Slow(Duration::from_secs(1)));

    let (a, b, c) = tokio::join!(
        h.service.parse_ifc(sample(), &cancel),
        h.service.parse_ifc(sample(), &cancel),
        h.service.parse_ifc(sample(), &cancel),
    );
    let remote_results = [a.unwrap(), b.unwrap(), c.unwrap()]
        .iter()
        .filter(|r| r.counts.buildings == REMOTE_BUILDINGS)
        .count();

    assert_eq!(remote_results, 1);
    assert_eq!(h.remote.calls(), 2);
    assert_eq!(h.service.breaker().state(), CircuitState::Closed);
}

#[tokio::test]
async fn test_both_paths_disabled_is_no_parser_available() {
    let h = harness(Behavior::Succeed, options(false, false, 3));
    let cancel = CancellationToken::new();

    let oversized = bytes::Bytes::from(vec![b' '; MAX_FILE_SIZE as usize + 1]);
    for data in [sample(), not_ifc(), oversized] {
        let err = h.service.parse_ifc(data.clone(), &cancel).await.unwrap_err();
        assert!(matches!(err, IngestError::NoParserAvailable { .. }));
        assert_eq!(err.code(), "NO_PARSER_AVAILABLE");

        let err = h.service.validate_ifc(data, &cancel).await.unwrap_err();
        assert!(matches!(err, IngestError::NoParserAvailable { .. }));
    }
    assert_eq!(h.remote.calls(), 0);
    assert!(h.logger.contains("No IFC parser available"));
}

#[tokio::test]
async fn test_service_disabled_uses_native_directly() {
    let h = harness(Behavior::Succeed, options(false, true, 3));
    let result = h
        .service
        .parse_ifc(sample(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(result.counts.buildings, 1);
    assert_eq!(h.remote.calls(), 0);
    let fallback = h.logger.find("Falling back to native IFC parser");
    assert_eq!(fallback[0].event.get("reason"), Some("service_disabled"));
}

#[tokio::test]
async fn test_remote_error_relayed_without_fallback() {
    let h = harness(Behavior::FailService, options(true, false, 3));
    let err = h
        .service
        .parse_ifc(sample(), &CancellationToken::new())
        .await
        .unwrap_err();

    match err {
        IngestError::Remote(remote) => assert_eq!(remote.service_code(), Some("PARSE_FAILED")),
        other => panic!("expected relayed remote error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_native_errors_returned_unmodified() {
    let h = harness(Behavior::FailStatus, options(true, true, 3));
    let cancel = CancellationToken::new();

    let err = h.service.parse_ifc(not_ifc(), &cancel).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Native(ifc_ingest_core::Error::InvalidFormat { .. })
    ));
    assert!(err.to_string().contains("Invalid IFC format"));

    let result = h.service.validate_ifc(not_ifc(), &cancel).await.unwrap();
    assert!(!result.valid);
    assert_eq!(result.errors.len(), 3);
}

#[tokio::test]
async fn test_oversized_input_fails_before_any_parser() {
    let h = harness(Behavior::Succeed, options(true, true, 3));
    let data = bytes::Bytes::from(vec![b' '; MAX_FILE_SIZE as usize + 1]);

    let err = h
        .service
        .parse_ifc(data, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "FILE_TOO_LARGE");
    assert_eq!(h.remote.calls(), 0);
    assert_eq!(h.service.breaker().consecutive_failures(), 0);
}

#[tokio::test]
async fn test_cancellation_is_not_a_remote_failure() {
    let h = harness(Behavior::Hang, options(true, true, 1));
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = h.service.parse_ifc(sample(), &cancel).await.unwrap_err();
    assert!(matches!(err, IngestError::Cancelled));
    assert_eq!(h.service.breaker().state(), CircuitState::Closed);
    assert_eq!(h.service.breaker().consecutive_failures(), 0);
    assert!(!h.logger.contains("Falling back"));

    let err = h.service.parse_ifc(sample(), &cancel).await.unwrap_err();
    assert!(matches!(err, IngestError::Cancelled));
    assert_eq!(h.remote.calls(), 1);
}

#[tokio::test]
async fn test_remote_only_operations_are_gated() {
    let cancel = CancellationToken::new();
    let request = SpatialQueryRequest::new("nearest");

    let disabled = harness(Behavior::Succeed, options(false, true, 1));
    let err = disabled
        .service
        .spatial_query(sample(), &request, &cancel)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        IngestError::RemoteOnly {
            operation: "spatial_query"
        }
    ));

    let h = harness(Behavior::FailStatus, options(true, true, 1));
    let err = h.service.metrics(&cancel).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Remote(RemoteError::Status { status: 500, .. })
    ));
    assert_eq!(h.service.breaker().state(), CircuitState::Open);

    let err = h.service.spatial_bounds(sample(), &cancel).await.unwrap_err();
    assert_eq!(err.code(), "CIRCUIT_OPEN");
    assert_eq!(h.remote.calls(), 1);
}

#[tokio::test]
async fn test_spatial_query_passes_through() {
    let h = harness(Behavior::Succeed, options(true, true, 3));
    let request = SpatialQueryRequest::new("within_bounds");
    let result = h
        .service
        .spatial_query(sample(), &request, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.query_type, "within_bounds");
}

#[tokio::test]
async fn test_status_reports_breaker_and_availability() {
    let h = harness(Behavior::FailStatus, options(true, true, 5));
    let cancel = CancellationToken::new();
    h.service.parse_ifc(sample(), &cancel).await.unwrap();

    let status = h.service.status(&cancel).await;
    assert_eq!(status.remote_available, Some(false));
    assert_eq!(status.breaker.consecutive_failures, 1);
    assert_eq!(status.breaker.state, CircuitState::Closed);
    assert!(!status.cache_enabled);
    assert_eq!(status.max_file_size, MAX_FILE_SIZE);

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["breaker"]["state"], "closed");
}

#[tokio::test]
async fn test_remote_results_are_cached() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path(), Duration::from_secs(3600))
        .await
        .unwrap();
    let remote = FakeRemote::new(Behavior::Succeed);
    let logger = MemoryLogger::new();
    let service = IfcService::new(
        remote.clone(),
        NativeParser::new(MAX_FILE_SIZE),
        options(true, true, 3),
        logger.clone(),
    )
    .with_cache(cache);
    let cancel = CancellationToken::new();

    let first = service.parse_ifc(sample(), &cancel).await.unwrap();
    let second = service.parse_ifc(sample(), &cancel).await.unwrap();

    assert_eq!(first.counts, second.counts);
    assert_eq!(remote.calls(), 1);
    assert!(logger.contains("cache hit"));

    // Validation is cached under its own key.
    service.validate_ifc(sample(), &cancel).await.unwrap();
    assert_eq!(remote.calls(), 2);
}

#[tokio::test]
async fn test_native_results_are_not_cached() {
    let dir = tempfile::tempdir().unwrap();
    let cache = ResultCache::new(dir.path(), Duration::from_secs(3600))
        .await
        .unwrap();
    let remote = FakeRemote::new(Behavior::FailStatus);
    let service = IfcService::new(
        remote.clone(),
        NativeParser::new(MAX_FILE_SIZE),
        options(true, true, 10),
        MemoryLogger::new(),
    )
    .with_cache(cache);
    let cancel = CancellationToken::new();

    service.parse_ifc(sample(), &cancel).await.unwrap();
    service.parse_ifc(sample(), &cancel).await.unwrap();
    assert_eq!(remote.calls(), 2);
}
