//! Integration tests for the download orchestrator.
//!
//! These tests drive complete jobs against a scripted in-process tile server
//! and the in-memory package store, covering:
//! - Plan expansion with marker icons and the final package
//! - Cancel, suspend and resume while fetches are in flight
//! - Fatal and tolerated failures
//! - Suspend during setup, store failures and package removal
//!
//! Run with: `cargo test --test download_integration`

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Semaphore};

use offlinemap::config::DownloaderConfig;
use offlinemap::coord::CoordinateRegion;
use offlinemap::downloader::OfflineMapDownloader;
use offlinemap::job::{DownloadRequest, JobId, JobState, ProgressSnapshot};
use offlinemap::notify::{ChannelNotifier, DownloadEvent};
use offlinemap::plan::Endpoints;
use offlinemap::provider::{Connectivity, FetchError, Fetcher};
use offlinemap::store::{MemoryPackageStore, StoreError};
use offlinemap::{BoxFuture, DownloadError};

// ============================================================================
// Helper Functions
// ============================================================================

const BASE: &str = "http://tiles.test/v3/";
const MAP: &str = "test.map";
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

fn metadata_url() -> String {
    format!("{}{}.json?secure", BASE, MAP)
}

fn marker_data_url() -> String {
    format!("{}{}/markers.geojson", BASE, MAP)
}

fn tile_url(z: u8, x: u32, y: u32) -> String {
    format!("{}{}/{}/{}/{}@2x.png", BASE, MAP, z, x, y)
}

fn icon_url() -> String {
    format!("{}marker/pin-m-cafe+ff0000@2x.png", BASE)
}

/// Region around (0, 0) covering exactly 2x2 tiles at zoom 1.
fn request() -> DownloadRequest {
    DownloadRequest::new(MAP, CoordinateRegion::new(0.0, 0.0, 20.0, 20.0), 1, 1)
}

fn all_tiles() -> Vec<String> {
    vec![
        tile_url(1, 0, 0),
        tile_url(1, 0, 1),
        tile_url(1, 1, 0),
        tile_url(1, 1, 1),
    ]
}

const MARKERS: &[u8] = br##"{
    "type": "FeatureCollection",
    "features": [
        {
            "type": "Feature",
            "geometry": { "type": "Point", "coordinates": [1.0, 1.0] },
            "properties": {
                "marker-size": "medium",
                "marker-color": "#ff0000",
                "marker-symbol": "cafe"
            }
        },
        {
            "type": "Feature",
            "geometry": { "type": "LineString", "coordinates": [[0, 0], [1, 1]] },
            "properties": {}
        }
    ]
}"##;

#[derive(Clone)]
enum Reply {
    Body(Bytes),
    Status(u16),
    Hang,
}

/// Scripted tile server.
///
/// Unscripted URLs answer with a small body. With a gate installed, every
/// fetch waits for a permit before answering.
struct FakeServer {
    replies: HashMap<String, Reply>,
    gate: Option<Arc<Semaphore>>,
    answered: Mutex<HashMap<String, usize>>,
}

impl FakeServer {
    fn new() -> Self {
        Self {
            replies: HashMap::new(),
            gate: None,
            answered: Mutex::new(HashMap::new()),
        }
    }

    fn with_markers() -> Self {
        Self::new().reply(&marker_data_url(), Reply::Body(Bytes::from_static(MARKERS)))
    }

    fn reply(mut self, url: &str, reply: Reply) -> Self {
        self.replies.insert(url.to_string(), reply);
        self
    }

    fn gated(mut self, gate: Arc<Semaphore>) -> Self {
        self.gate = Some(gate);
        self
    }

    fn answered(&self, url: &str) -> usize {
        self.answered.lock().get(url).copied().unwrap_or(0)
    }

    fn total_answered(&self) -> usize {
        self.answered.lock().values().sum()
    }
}

impl Fetcher for FakeServer {
    fn fetch<'a>(
        &'a self,
        url: &'a str,
        _timeout: Duration,
    ) -> BoxFuture<'a, Result<Bytes, FetchError>> {
        Box::pin(async move {
            if let Some(gate) = &self.gate {
                if let Ok(permit) = gate.acquire().await {
                    permit.forget();
                }
            }

            let reply = self
                .replies
                .get(url)
                .cloned()
                .unwrap_or_else(|| Reply::Body(Bytes::from(format!("body of {}", url))));
            if let Reply::Hang = reply {
                std::future::pending::<()>().await;
            }

            *self.answered.lock().entry(url.to_string()).or_insert(0) += 1;
            match reply {
                Reply::Body(body) => Ok(body),
                Reply::Status(status) => Err(FetchError::Status {
                    url: url.to_string(),
                    status,
                }),
                Reply::Hang => unreachable!(),
            }
        })
    }
}

struct Offline;

impl Connectivity for Offline {
    fn is_available(&self) -> BoxFuture<'_, bool> {
        Box::pin(async { false })
    }
}

struct Harness {
    downloader: OfflineMapDownloader,
    server: Arc<FakeServer>,
    store: Arc<MemoryPackageStore>,
    events: mpsc::UnboundedReceiver<DownloadEvent>,
}

fn harness(server: FakeServer) -> Harness {
    harness_with(server, DownloaderConfig::new(Endpoints::new(BASE)), None)
}

fn harness_with(
    server: FakeServer,
    config: DownloaderConfig,
    connectivity: Option<Arc<dyn Connectivity>>,
) -> Harness {
    let server = Arc::new(server);
    let store = Arc::new(MemoryPackageStore::new());
    let (notifier, events) = ChannelNotifier::new();

    let mut builder = OfflineMapDownloader::builder(config, server.clone(), store.clone())
        .notifier(Arc::new(notifier));
    if let Some(connectivity) = connectivity {
        builder = builder.connectivity(connectivity);
    }

    Harness {
        downloader: builder.build(),
        server,
        store,
        events,
    }
}

/// Collects events until one matches `done`, returning all of them.
async fn events_until<F>(events: &mut mpsc::UnboundedReceiver<DownloadEvent>, done: F) -> Vec<DownloadEvent>
where
    F: Fn(&DownloadEvent) -> bool,
{
    let mut seen = Vec::new();
    loop {
        let event = tokio::time::timeout(EVENT_TIMEOUT, events.recv())
            .await
            .expect("timed out waiting for download event")
            .expect("event channel closed");
        let finished = done(&event);
        seen.push(event);
        if finished {
            return seen;
        }
    }
}

async fn until_completed(events: &mut mpsc::UnboundedReceiver<DownloadEvent>) -> Vec<DownloadEvent> {
    events_until(events, |e| matches!(e, DownloadEvent::Completed { .. })).await
}

fn completion(events: &[DownloadEvent]) -> (Option<offlinemap::CompletedPackage>, Option<DownloadError>) {
    match events.last() {
        Some(DownloadEvent::Completed { package, error, .. }) => (package.clone(), error.clone()),
        other => panic!("expected completion, got {:?}", other),
    }
}

fn states(events: &[DownloadEvent]) -> Vec<JobState> {
    events
        .iter()
        .filter_map(|e| match e {
            DownloadEvent::StateChanged { state, .. } => Some(*state),
            _ => None,
        })
        .collect()
}

fn partial_failures(events: &[DownloadEvent]) -> Vec<DownloadError> {
    events
        .iter()
        .filter_map(|e| match e {
            DownloadEvent::PartialFailure { error, .. } => Some(error.clone()),
            _ => None,
        })
        .collect()
}

fn is_progress(written: usize) -> impl Fn(&DownloadEvent) -> bool {
    move |e| matches!(e, DownloadEvent::Progress { written: w, .. } if *w == written)
}

// ============================================================================
// Integration Tests
// ============================================================================

/// Metadata, marker data, four tiles and one discovered icon make seven files.
#[tokio::test]
async fn test_full_download_produces_package() {
    let mut h = harness(FakeServer::with_markers());

    let job_id = h.downloader.begin_downloading(request()).await.unwrap();
    assert_eq!(h.downloader.active_job(), Some(job_id));

    let events = until_completed(&mut h.events).await;
    let (package, error) = completion(&events);
    let package = package.expect("package");

    assert!(error.is_none());
    assert_eq!(package.id(), job_id);
    assert_eq!(package.map_id(), MAP);
    assert_eq!(package.resource_count, 7);
    assert_eq!(package.missing_count(), 0);
    assert!(package.is_valid());

    // Initial count precedes every progress event; progress is monotonic.
    let initial = events
        .iter()
        .position(|e| matches!(e, DownloadEvent::InitialCount { expected: 7, .. }))
        .expect("initial count");
    let progress: Vec<(usize, usize, usize)> = events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            DownloadEvent::Progress {
                written, expected, ..
            } => Some((i, *written, *expected)),
            _ => None,
        })
        .collect();
    assert_eq!(progress.len(), 7);
    assert!(progress.iter().all(|(i, _, expected)| *i > initial && *expected == 7));
    assert_eq!(
        progress.iter().map(|(_, w, _)| *w).collect::<Vec<_>>(),
        (1..=7).collect::<Vec<_>>()
    );

    assert_eq!(states(&events), vec![JobState::Running, JobState::Available]);
    assert_eq!(h.downloader.state(), JobState::Available);
    assert_eq!(h.downloader.active_job(), None);
    assert_eq!(h.downloader.progress(), ProgressSnapshot::default());
    assert_eq!(h.downloader.list_completed_packages(), vec![package]);

    // Marker data is fetched once, during setup, and persisted with the rest.
    assert_eq!(h.server.answered(&marker_data_url()), 1);
    assert_eq!(h.server.total_answered(), 7);
    assert_eq!(
        h.store.resource(job_id, &marker_data_url()),
        Some(Bytes::from_static(MARKERS))
    );
    assert!(h.store.resource(job_id, &icon_url()).is_some());
    assert!(h.store.resource(job_id, &metadata_url()).is_some());
    for tile in all_tiles() {
        assert!(h.store.resource(job_id, &tile).is_some(), "missing {}", tile);
    }
}

#[tokio::test]
async fn test_cancel_mid_download_discards_package() {
    let gate = Arc::new(Semaphore::new(0));
    let config = DownloaderConfig::new(Endpoints::new(BASE)).with_max_concurrent_fetches(2);
    let mut h = harness_with(FakeServer::new().gated(gate.clone()), config, None);

    let job_id = h
        .downloader
        .begin_downloading(request().with_markers(false))
        .await
        .unwrap();
    events_until(&mut h.events, |e| matches!(e, DownloadEvent::InitialCount { .. })).await;

    gate.add_permits(1);
    events_until(&mut h.events, is_progress(1)).await;
    assert_eq!(h.downloader.progress().files_written, 1);

    assert!(h.downloader.cancel().await);

    let events = until_completed(&mut h.events).await;
    let (package, error) = completion(&events);
    assert!(package.is_none());
    assert_eq!(error, Some(DownloadError::Cancelled));
    assert_eq!(states(&events), vec![JobState::Canceling, JobState::Available]);

    assert_eq!(h.downloader.state(), JobState::Available);
    assert_eq!(h.downloader.progress(), ProgressSnapshot::default());
    assert_eq!(h.store.discarded(), vec![job_id]);
    assert!(!h.store.is_open(job_id));
    assert!(h.downloader.list_completed_packages().is_empty());

    // Releasing the stalled fetches must not produce late progress.
    gate.add_permits(10);
    tokio::time::sleep(Duration::from_millis(50)).await;
    while let Ok(event) = h.events.try_recv() {
        assert!(
            !matches!(event, DownloadEvent::Progress { .. }),
            "late progress after cancel: {:?}",
            event
        );
    }
    assert_eq!(h.downloader.progress(), ProgressSnapshot::default());

    // A second cancel is a no-op.
    assert!(!h.downloader.cancel().await);
}

#[tokio::test]
async fn test_suspend_and_resume_fetch_only_missing() {
    let gate = Arc::new(Semaphore::new(0));
    let config = DownloaderConfig::new(Endpoints::new(BASE)).with_max_concurrent_fetches(2);
    let mut h = harness_with(FakeServer::new().gated(gate.clone()), config, None);

    let job_id = h
        .downloader
        .begin_downloading(request().with_markers(false))
        .await
        .unwrap();
    events_until(&mut h.events, |e| matches!(e, DownloadEvent::InitialCount { expected: 5, .. })).await;

    gate.add_permits(2);
    events_until(&mut h.events, is_progress(2)).await;

    assert!(h.downloader.suspend().await);
    assert_eq!(h.downloader.state(), JobState::Suspended);
    assert!(!h.downloader.suspend().await);

    // Nothing moves while suspended, even with fetches unblocked.
    gate.add_permits(100);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(
        h.downloader.progress(),
        ProgressSnapshot {
            files_written: 2,
            files_expected: 5
        }
    );
    assert_eq!(h.server.total_answered(), 2);
    assert!(h.store.is_open(job_id));

    assert!(h.downloader.resume().await);
    let events = until_completed(&mut h.events).await;
    let (package, error) = completion(&events);

    assert!(error.is_none());
    assert_eq!(package.expect("package").resource_count, 5);
    assert_eq!(h.server.total_answered(), 5);
    assert_eq!(h.server.answered(&metadata_url()), 1);
    for tile in all_tiles() {
        assert_eq!(h.server.answered(&tile), 1, "{} fetched more than once", tile);
    }
}

/// Marker data arriving after a suspend is neither stored nor counted.
#[tokio::test]
async fn test_suspend_during_marker_fetch() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = harness_with(
        FakeServer::with_markers().gated(gate.clone()),
        DownloaderConfig::new(Endpoints::new(BASE)),
        None,
    );

    let job_id = h.downloader.begin_downloading(request()).await.unwrap();
    assert!(h.downloader.suspend().await);

    gate.add_permits(100);
    let setup = events_until(&mut h.events, |e| {
        matches!(e, DownloadEvent::InitialCount { expected: 7, .. })
    })
    .await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.downloader.state(), JobState::Suspended);
    assert_eq!(
        h.downloader.progress(),
        ProgressSnapshot {
            files_written: 0,
            files_expected: 7
        }
    );
    assert!(!setup.iter().any(|e| matches!(e, DownloadEvent::Progress { .. })));
    assert!(h.store.is_open(job_id));
    assert!(h.store.resource(job_id, &marker_data_url()).is_none());
    assert_eq!(h.server.total_answered(), 1);

    assert!(h.downloader.resume().await);
    let events = until_completed(&mut h.events).await;
    let package = completion(&events).0.expect("package");

    assert_eq!(package.resource_count, 7);
    assert!(package.missing.is_empty());
    assert_eq!(h.server.answered(&marker_data_url()), 2);
    assert_eq!(h.server.answered(&icon_url()), 1);
    assert!(h.store.resource(job_id, &marker_data_url()).is_some());
}

#[tokio::test]
async fn test_suspended_job_can_be_cancelled() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = harness_with(
        FakeServer::new().gated(gate.clone()),
        DownloaderConfig::new(Endpoints::new(BASE)),
        None,
    );

    let job_id = h
        .downloader
        .begin_downloading(request().with_markers(false))
        .await
        .unwrap();
    events_until(&mut h.events, |e| matches!(e, DownloadEvent::InitialCount { .. })).await;

    assert!(h.downloader.suspend().await);
    assert!(h.downloader.cancel().await);

    let events = until_completed(&mut h.events).await;
    assert_eq!(completion(&events).1, Some(DownloadError::Cancelled));
    assert_eq!(h.downloader.state(), JobState::Available);
    assert_eq!(h.store.discarded(), vec![job_id]);
}

#[tokio::test]
async fn test_no_connectivity_aborts_job() {
    let mut h = harness_with(
        FakeServer::with_markers(),
        DownloaderConfig::new(Endpoints::new(BASE)),
        Some(Arc::new(Offline)),
    );

    h.downloader.begin_downloading(request()).await.unwrap();
    let events = until_completed(&mut h.events).await;

    assert_eq!(completion(&events), (None, Some(DownloadError::NoConnectivity)));
    assert!(!events
        .iter()
        .any(|e| matches!(e, DownloadEvent::InitialCount { .. })));
    assert_eq!(
        states(&events),
        vec![JobState::Running, JobState::Canceling, JobState::Available]
    );
    assert_eq!(h.server.total_answered(), 0);
    assert_eq!(h.downloader.state(), JobState::Available);
}

#[tokio::test]
async fn test_connectivity_not_checked_without_markers() {
    let mut h = harness_with(
        FakeServer::new(),
        DownloaderConfig::new(Endpoints::new(BASE)),
        Some(Arc::new(Offline)),
    );

    h.downloader
        .begin_downloading(request().with_markers(false))
        .await
        .unwrap();
    let events = until_completed(&mut h.events).await;

    assert_eq!(completion(&events).0.expect("package").resource_count, 5);
}

#[tokio::test]
async fn test_missing_marker_data_is_not_fatal() {
    let server = FakeServer::new().reply(&marker_data_url(), Reply::Status(404));
    let mut h = harness(server);

    h.downloader.begin_downloading(request()).await.unwrap();
    let events = until_completed(&mut h.events).await;
    let (package, error) = completion(&events);

    assert!(error.is_none());
    assert_eq!(package.expect("package").resource_count, 5);
    assert!(events
        .iter()
        .any(|e| matches!(e, DownloadEvent::InitialCount { expected: 5, .. })));

    let failures = partial_failures(&events);
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        &failures[0],
        DownloadError::ResourceFetch { url, source } if *url == marker_data_url() && source.status() == Some(404)
    ));
}

#[tokio::test]
async fn test_malformed_marker_data_is_tolerated() {
    let server = FakeServer::new().reply(
        &marker_data_url(),
        Reply::Body(Bytes::from_static(b"<html>not json</html>")),
    );
    let mut h = harness(server);

    let job_id = h.downloader.begin_downloading(request()).await.unwrap();
    let events = until_completed(&mut h.events).await;
    let (package, error) = completion(&events);

    assert!(error.is_none());
    assert_eq!(package.expect("package").resource_count, 6);
    assert!(matches!(
        partial_failures(&events).as_slice(),
        [DownloadError::MalformedMarkerData(_)]
    ));
    assert!(h.store.resource(job_id, &marker_data_url()).is_some());
}

#[tokio::test]
async fn test_metadata_failure_aborts_job() {
    // One fetch at a time, metadata first: nothing else may be fetched.
    let server = FakeServer::new().reply(&metadata_url(), Reply::Status(500));
    let config = DownloaderConfig::new(Endpoints::new(BASE)).with_max_concurrent_fetches(1);
    let mut h = harness_with(server, config, None);

    let job_id = h
        .downloader
        .begin_downloading(request().with_markers(false))
        .await
        .unwrap();
    let events = until_completed(&mut h.events).await;
    let (package, error) = completion(&events);

    assert!(package.is_none());
    match error {
        Some(DownloadError::CriticalResourceFetch { url, source }) => {
            assert_eq!(url, metadata_url());
            assert_eq!(source.status(), Some(500));
        }
        other => panic!("expected critical failure, got {:?}", other),
    }
    assert_eq!(
        states(&events),
        vec![JobState::Running, JobState::Canceling, JobState::Available]
    );
    assert_eq!(h.store.discarded(), vec![job_id]);
    assert!(h.downloader.list_completed_packages().is_empty());
    assert_eq!(h.downloader.progress(), ProgressSnapshot::default());

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.server.total_answered(), 1);
    for tile in all_tiles() {
        assert_eq!(h.server.answered(&tile), 0, "{} fetched after abort", tile);
    }
    assert!(!events.iter().any(|e| matches!(e, DownloadEvent::Progress { .. })));
}

#[tokio::test]
async fn test_store_write_failure_aborts_job() {
    let mut h = harness(FakeServer::new());
    h.store.set_reject_writes(true);

    let job_id = h
        .downloader
        .begin_downloading(request().with_markers(false))
        .await
        .unwrap();
    let events = until_completed(&mut h.events).await;
    let (package, error) = completion(&events);

    assert!(package.is_none());
    assert!(matches!(
        error,
        Some(DownloadError::Store(StoreError::Rejected(_)))
    ));
    assert_eq!(
        states(&events),
        vec![JobState::Running, JobState::Canceling, JobState::Available]
    );
    assert_eq!(h.downloader.progress(), ProgressSnapshot::default());
    assert_eq!(h.downloader.state(), JobState::Available);
    assert_eq!(h.store.discarded(), vec![job_id]);
    assert!(h.downloader.list_completed_packages().is_empty());
}

#[tokio::test]
async fn test_tile_failures_are_tolerated() {
    let broken = tile_url(1, 1, 0);
    let server = FakeServer::new().reply(&broken, Reply::Status(404));
    let mut h = harness(server);

    h.downloader
        .begin_downloading(request().with_markers(false))
        .await
        .unwrap();
    let events = until_completed(&mut h.events).await;
    let package = completion(&events).0.expect("package");

    assert_eq!(package.resource_count, 4);
    assert_eq!(package.missing, vec![broken.clone()]);
    assert!(matches!(
        partial_failures(&events).as_slice(),
        [DownloadError::ResourceFetch { url, .. }] if *url == broken
    ));
}

#[tokio::test]
async fn test_stalled_fetch_times_out() {
    let stalled = tile_url(1, 0, 1);
    let server = FakeServer::new().reply(&stalled, Reply::Hang);
    let config = DownloaderConfig::new(Endpoints::new(BASE))
        .with_fetch_timeout(Duration::from_millis(100));
    let mut h = harness_with(server, config, None);

    h.downloader
        .begin_downloading(request().with_markers(false).with_metadata(false))
        .await
        .unwrap();
    let events = until_completed(&mut h.events).await;
    let package = completion(&events).0.expect("package");

    assert_eq!(package.resource_count, 3);
    assert_eq!(package.missing, vec![stalled]);
    assert!(matches!(
        partial_failures(&events).as_slice(),
        [DownloadError::ResourceFetch { source, .. }] if source.is_timeout()
    ));
}

#[tokio::test]
async fn test_second_job_rejected_while_busy() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = harness_with(
        FakeServer::new().gated(gate.clone()),
        DownloaderConfig::new(Endpoints::new(BASE)),
        None,
    );

    let first = h
        .downloader
        .begin_downloading(request().with_markers(false))
        .await
        .unwrap();

    let err = h
        .downloader
        .begin_downloading(request().with_markers(false))
        .await
        .unwrap_err();
    assert_eq!(err, DownloadError::Busy(JobState::Running));
    assert_eq!(h.downloader.active_job(), Some(first));

    h.downloader.cancel().await;
    until_completed(&mut h.events).await;

    gate.add_permits(100);
    let second = h
        .downloader
        .begin_downloading(request().with_markers(false))
        .await
        .unwrap();
    assert_ne!(first, second);
    let events = until_completed(&mut h.events).await;
    assert_eq!(completion(&events).0.expect("package").id(), second);
}

#[tokio::test]
async fn test_concurrent_begin_admits_one_job() {
    let gate = Arc::new(Semaphore::new(0));
    let mut h = harness_with(
        FakeServer::new().gated(gate.clone()),
        DownloaderConfig::new(Endpoints::new(BASE)),
        None,
    );

    let attempts = (0..4).map(|_| {
        let downloader = h.downloader.clone();
        async move {
            downloader
                .begin_downloading(request().with_markers(false))
                .await
        }
    });
    let results = futures::future::join_all(attempts).await;

    let admitted: Vec<JobId> = results.iter().filter_map(|r| r.as_ref().ok().copied()).collect();
    assert_eq!(admitted.len(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| *e == DownloadError::Busy(JobState::Running)));
    assert_eq!(h.downloader.active_job(), Some(admitted[0]));

    h.downloader.cancel().await;
    let events = until_completed(&mut h.events).await;
    assert_eq!(completion(&events).1, Some(DownloadError::Cancelled));
}

#[tokio::test]
async fn test_tile_limit_rejects_request() {
    let config = DownloaderConfig::new(Endpoints::new(BASE)).with_max_tiles(3);
    let h = harness_with(FakeServer::new(), config, None);

    let err = h.downloader.begin_downloading(request()).await.unwrap_err();

    assert!(matches!(err, DownloadError::InvalidRegion(_)));
    assert_eq!(h.downloader.state(), JobState::Available);
}

#[tokio::test]
async fn test_remove_package_by_id() {
    let mut h = harness(FakeServer::with_markers());

    let job_id = h.downloader.begin_downloading(request()).await.unwrap();
    let events = until_completed(&mut h.events).await;
    let package = completion(&events).0.expect("package");
    let held = package.clone();

    assert!(h.downloader.remove_package_by_id(job_id).await.unwrap());

    assert!(!held.is_valid());
    assert!(!package.is_valid());
    assert!(h.downloader.list_completed_packages().is_empty());
    assert_eq!(h.store.sealed_count(), 0);

    assert!(!h.downloader.remove_package_by_id(job_id).await.unwrap());
    assert!(!h
        .downloader
        .remove_package_by_id(JobId::generate())
        .await
        .unwrap());
}

#[tokio::test]
async fn test_remove_package_by_reference() {
    let mut h = harness(FakeServer::new());

    h.downloader
        .begin_downloading(request().with_markers(false))
        .await
        .unwrap();
    let events = until_completed(&mut h.events).await;
    let package = completion(&events).0.expect("package");
    let listed = h.downloader.list_completed_packages();
    assert_eq!(listed.len(), 1);

    assert!(h.downloader.remove_package(&listed[0]).await.unwrap());

    assert!(!package.is_valid());
    assert!(h.downloader.list_completed_packages().is_empty());
    assert_eq!(h.store.sealed_count(), 0);
    assert!(!h.downloader.remove_package(&package).await.unwrap());
}
