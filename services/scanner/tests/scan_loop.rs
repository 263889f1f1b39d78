//! Integration tests for the scan loop controller, driven end to end
//! through mock ports: a scripted camera, a decoder that reads payloads
//! straight out of frame pixels, and a scripted resolver.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::time::sleep;

use scanner_lib::config::Config;
use scanner_lib::scan::resolve_task::{NOT_FOUND_MESSAGE, TRANSPORT_ERROR_MESSAGE};
use scanner_lib::scan::{AppState, ScanController};
use veritrace_core::domain::{
    CodeCorners, DecodedCode, FrameBuffer, Point, Resolution, ScanState, StatusSnapshot,
    StreamRequest,
};
use veritrace_core::ports::{
    CodeResolver, FrameDecoder, MediaError, MediaResult, MediaSourceProvider, NavigationSink,
    ResolveError, VideoStream,
};

const TICK_MS: u64 = 10;
/// Long enough for several ticks even on a loaded machine.
const SETTLE: Duration = Duration::from_millis(100);

//=========================================================================================
// Mock Ports
//=========================================================================================

/// Camera that "sees" whatever payload the test currently shows it.
struct MockMedia {
    /// Scripted grant outcomes for successive activations; empty means grant.
    script: StdMutex<VecDeque<MediaResult<()>>>,
    visible: Arc<StdMutex<Option<String>>>,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
}

#[async_trait]
impl MediaSourceProvider for MockMedia {
    async fn request_video_stream(
        &self,
        _request: StreamRequest,
    ) -> MediaResult<Box<dyn VideoStream>> {
        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            outcome?;
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MockStream {
            visible: self.visible.clone(),
            released_counter: self.released.clone(),
            released: false,
        }))
    }
}

struct MockStream {
    visible: Arc<StdMutex<Option<String>>>,
    released_counter: Arc<AtomicUsize>,
    released: bool,
}

impl VideoStream for MockStream {
    fn latest_frame(&mut self) -> Option<FrameBuffer> {
        self.visible.lock().unwrap().as_ref().map(|payload| {
            FrameBuffer::new(
                payload.len() as u32,
                1,
                Bytes::copy_from_slice(payload.as_bytes()),
            )
        })
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.released_counter.fetch_add(1, Ordering::SeqCst);
        }
    }
}

impl Drop for MockStream {
    fn drop(&mut self) {
        self.release();
    }
}

/// Decoder that treats the frame's pixels as a UTF-8 payload.
struct TextDecoder {
    decodes: Arc<AtomicUsize>,
}

impl FrameDecoder for TextDecoder {
    fn decode(&self, frame: &FrameBuffer) -> Option<DecodedCode> {
        self.decodes.fetch_add(1, Ordering::SeqCst);
        let payload = String::from_utf8(frame.pixels.to_vec()).ok()?;
        if payload.is_empty() {
            return None;
        }
        Some(DecodedCode {
            payload,
            corners: unit_corners(),
        })
    }
}

fn unit_corners() -> CodeCorners {
    CodeCorners {
        top_left: Point { x: 0.0, y: 0.0 },
        top_right: Point { x: 1.0, y: 0.0 },
        bottom_right: Point { x: 1.0, y: 1.0 },
        bottom_left: Point { x: 0.0, y: 1.0 },
    }
}

/// Scripted lookup outcome per payload; unknown payloads are `NotFound`.
enum Scripted {
    Found(&'static str),
    Transport,
}

struct MockResolver {
    outcomes: HashMap<String, Scripted>,
    delay: Duration,
    calls: Arc<StdMutex<Vec<String>>>,
}

#[async_trait]
impl CodeResolver for MockResolver {
    async fn resolve(&self, payload: &str) -> Result<Resolution, ResolveError> {
        self.calls.lock().unwrap().push(payload.to_string());
        if !self.delay.is_zero() {
            sleep(self.delay).await;
        }
        match self.outcomes.get(payload) {
            Some(Scripted::Found(record_id)) => Ok(Resolution::Found {
                record_id: record_id.to_string(),
            }),
            Some(Scripted::Transport) => Err(ResolveError("connection refused".to_string())),
            None => Ok(Resolution::NotFound),
        }
    }
}

struct RecordingNavigator {
    navigations: Arc<StdMutex<Vec<String>>>,
}

impl NavigationSink for RecordingNavigator {
    fn navigate_to_record(&self, record_id: &str) {
        self.navigations.lock().unwrap().push(record_id.to_string());
    }
}

//=========================================================================================
// Harness
//=========================================================================================

struct Harness {
    controller: ScanController,
    visible: Arc<StdMutex<Option<String>>>,
    acquired: Arc<AtomicUsize>,
    released: Arc<AtomicUsize>,
    decodes: Arc<AtomicUsize>,
    calls: Arc<StdMutex<Vec<String>>>,
    navigations: Arc<StdMutex<Vec<String>>>,
}

impl Harness {
    fn new(
        grants: Vec<MediaResult<()>>,
        outcomes: HashMap<String, Scripted>,
        resolver_delay: Duration,
    ) -> Self {
        let visible = Arc::new(StdMutex::new(None));
        let acquired = Arc::new(AtomicUsize::new(0));
        let released = Arc::new(AtomicUsize::new(0));
        let decodes = Arc::new(AtomicUsize::new(0));
        let calls = Arc::new(StdMutex::new(Vec::new()));
        let navigations = Arc::new(StdMutex::new(Vec::new()));

        let config = Arc::new(Config {
            bind_address: "127.0.0.1:0".parse().unwrap(),
            database_url: String::new(),
            log_level: tracing::Level::INFO,
            camera_index: 0,
            frame_width: 1280,
            frame_height: 720,
            decode_interval_ms: TICK_MS,
        });

        let app_state = Arc::new(AppState {
            config,
            media: Arc::new(MockMedia {
                script: StdMutex::new(grants.into()),
                visible: visible.clone(),
                acquired: acquired.clone(),
                released: released.clone(),
            }),
            decoder: Arc::new(TextDecoder {
                decodes: decodes.clone(),
            }),
            resolver: Arc::new(MockResolver {
                outcomes,
                delay: resolver_delay,
                calls: calls.clone(),
            }),
        });

        let controller = ScanController::new(
            app_state,
            Arc::new(RecordingNavigator {
                navigations: navigations.clone(),
            }),
        );

        Self {
            controller,
            visible,
            acquired,
            released,
            decodes,
            calls,
            navigations,
        }
    }

    /// Point the mock camera at a payload (or at nothing).
    fn show(&self, payload: Option<&str>) {
        *self.visible.lock().unwrap() = payload.map(str::to_string);
    }

    fn status(&self) -> StatusSnapshot {
        self.controller.status().borrow().clone()
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn navigations(&self) -> Vec<String> {
        self.navigations.lock().unwrap().clone()
    }
}

fn found(payload: &str, record_id: &'static str) -> HashMap<String, Scripted> {
    HashMap::from([(payload.to_string(), Scripted::Found(record_id))])
}

//=========================================================================================
// End-to-end flows
//=========================================================================================

#[tokio::test]
async fn decode_resolves_and_navigates_once() {
    let h = Harness::new(vec![], found("ABC123", "p1"), Duration::ZERO);
    h.show(Some("ABC123"));

    h.controller.activate().await.unwrap();
    sleep(SETTLE).await;

    assert_eq!(h.calls(), vec!["ABC123"]);
    assert_eq!(h.navigations(), vec!["p1"]);
    // Terminal for the session: camera released, back to idle.
    assert_eq!(h.status().state, ScanState::Idle);
    assert_eq!(h.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(h.released.load(Ordering::SeqCst), 1);

    // A later teardown does not double-release.
    h.controller.deactivate().await;
    assert_eq!(h.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn consecutive_identical_decodes_resolve_once() {
    let h = Harness::new(
        vec![],
        found("ABC123", "p1"),
        Duration::from_millis(15 * TICK_MS),
    );
    h.show(Some("ABC123"));

    h.controller.activate().await.unwrap();
    // Many ticks elapse while the resolution is still in flight.
    sleep(SETTLE).await;
    assert_eq!(h.calls().len(), 1);
    assert!(h.decodes.load(Ordering::SeqCst) >= 5);

    sleep(SETTLE).await;
    assert_eq!(h.calls().len(), 1);
    assert_eq!(h.navigations(), vec!["p1"]);
}

#[tokio::test]
async fn lookup_miss_reports_and_keeps_scanning() {
    let h = Harness::new(vec![], found("ABC123", "p1"), Duration::ZERO);
    h.show(Some("XYZ"));

    h.controller.activate().await.unwrap();
    sleep(SETTLE).await;

    let status = h.status();
    assert_eq!(status.state, ScanState::Scanning);
    assert_eq!(status.message.as_deref(), Some(NOT_FOUND_MESSAGE));
    assert_eq!(h.calls(), vec!["XYZ"]);

    // The loop keeps attempting decodes after the miss...
    let decodes_before = h.decodes.load(Ordering::SeqCst);
    sleep(SETTLE).await;
    assert!(h.decodes.load(Ordering::SeqCst) > decodes_before);

    // ...and a different code still resolves and navigates.
    h.show(Some("ABC123"));
    sleep(SETTLE).await;
    assert_eq!(h.navigations(), vec!["p1"]);
    assert!(h.status().message.is_none());
}

#[tokio::test]
async fn permission_denied_never_starts_the_loop() {
    let h = Harness::new(
        vec![Err(MediaError::PermissionDenied("blocked by user".into()))],
        HashMap::new(),
        Duration::ZERO,
    );
    h.show(Some("ABC123"));

    let result = h.controller.activate().await;
    assert!(matches!(result, Err(MediaError::PermissionDenied(_))));

    let status = h.status();
    assert_eq!(status.state, ScanState::Error);
    assert_eq!(
        status.message.as_deref(),
        Some("Cannot access camera. Check permissions and try again.")
    );

    // No stream, no ticks.
    sleep(SETTLE).await;
    assert_eq!(h.acquired.load(Ordering::SeqCst), 0);
    assert_eq!(h.decodes.load(Ordering::SeqCst), 0);

    // Teardown with nothing held is harmless.
    h.controller.deactivate().await;
    assert_eq!(h.released.load(Ordering::SeqCst), 0);
    assert_eq!(h.status().state, ScanState::Idle);
}

//=========================================================================================
// Dedupe and resource safety
//=========================================================================================

#[tokio::test]
async fn same_code_refires_only_after_a_different_code() {
    let h = Harness::new(vec![], HashMap::new(), Duration::ZERO);

    h.show(Some("AAA"));
    h.controller.activate().await.unwrap();
    sleep(SETTLE).await;
    assert_eq!(h.calls(), vec!["AAA"]);

    h.show(Some("BBB"));
    sleep(SETTLE).await;
    assert_eq!(h.calls(), vec!["AAA", "BBB"]);

    // Last-value comparison only: AAA is fresh again after BBB.
    h.show(Some("AAA"));
    sleep(SETTLE).await;
    assert_eq!(h.calls(), vec!["AAA", "BBB", "AAA"]);
}

#[tokio::test]
async fn every_activation_pairs_with_exactly_one_release() {
    let h = Harness::new(vec![], HashMap::new(), Duration::ZERO);

    for _ in 0..100 {
        h.controller.activate().await.unwrap();
        h.controller.deactivate().await;
    }

    assert_eq!(h.acquired.load(Ordering::SeqCst), 100);
    assert_eq!(h.released.load(Ordering::SeqCst), 100);
}

#[tokio::test]
async fn deactivate_discards_in_flight_resolution() {
    let h = Harness::new(
        vec![],
        found("ABC", "p1"),
        Duration::from_millis(20 * TICK_MS),
    );
    h.show(Some("ABC"));

    h.controller.activate().await.unwrap();
    sleep(Duration::from_millis(5 * TICK_MS)).await;
    assert_eq!(h.calls().len(), 1);

    h.controller.deactivate().await;
    assert_eq!(h.status().state, ScanState::Idle);

    // The resolver eventually returns Found, but the session is gone.
    sleep(Duration::from_millis(25 * TICK_MS)).await;
    assert!(h.navigations().is_empty());
    assert_eq!(h.status().state, ScanState::Idle);
}

#[tokio::test]
async fn transport_error_keeps_the_camera_live() {
    let h = Harness::new(
        vec![],
        HashMap::from([("BAD".to_string(), Scripted::Transport)]),
        Duration::ZERO,
    );
    h.show(Some("BAD"));

    h.controller.activate().await.unwrap();
    sleep(SETTLE).await;

    let status = h.status();
    assert_eq!(status.state, ScanState::Scanning);
    assert_eq!(status.message.as_deref(), Some(TRANSPORT_ERROR_MESSAGE));
    assert_eq!(h.released.load(Ordering::SeqCst), 0);

    let decodes_before = h.decodes.load(Ordering::SeqCst);
    sleep(SETTLE).await;
    assert!(h.decodes.load(Ordering::SeqCst) > decodes_before);
}

#[tokio::test]
async fn fatal_error_then_manual_retry_scans_again() {
    let h = Harness::new(
        vec![Err(MediaError::DeviceUnavailable("no camera".into())), Ok(())],
        found("ABC123", "p1"),
        Duration::ZERO,
    );
    h.show(Some("ABC123"));

    assert!(h.controller.activate().await.is_err());
    sleep(SETTLE).await;
    assert_eq!(h.decodes.load(Ordering::SeqCst), 0);
    assert_eq!(h.status().state, ScanState::Error);

    // Explicit user retry succeeds and the pipeline runs end to end.
    h.controller.activate().await.unwrap();
    sleep(SETTLE).await;
    assert_eq!(h.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(h.navigations(), vec!["p1"]);
}

//=========================================================================================
// Controller Surface
//=========================================================================================

#[tokio::test]
async fn activate_is_a_noop_while_scanning() {
    let h = Harness::new(vec![], HashMap::new(), Duration::ZERO);

    h.controller.activate().await.unwrap();
    h.controller.activate().await.unwrap();
    assert_eq!(h.acquired.load(Ordering::SeqCst), 1);

    h.controller.deactivate().await;
    assert_eq!(h.released.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn deactivate_is_idempotent() {
    let h = Harness::new(vec![], HashMap::new(), Duration::ZERO);

    h.controller.activate().await.unwrap();
    h.controller.deactivate().await;
    h.controller.deactivate().await;

    assert_eq!(h.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(h.released.load(Ordering::SeqCst), 1);
    assert_eq!(h.status().state, ScanState::Idle);
}

#[tokio::test]
async fn overlay_publishes_corners_and_clears_on_teardown() {
    let h = Harness::new(vec![], HashMap::new(), Duration::ZERO);
    h.show(Some("ABC"));

    h.controller.activate().await.unwrap();
    sleep(SETTLE).await;
    assert!(h.controller.overlay().borrow().is_some());

    h.controller.deactivate().await;
    assert!(h.controller.overlay().borrow().is_none());
}
