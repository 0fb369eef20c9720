mod common;

use common::{CountingOpener, Counters, Ending, FlakyEncoder, MarkerEncoder, MockTransport, stub_descriptor};
use posture_detect::{DetectError, Detection, Detector, NotReadyDetector, StubDetector};
use posture_image::{Frame, FrameEncoder, ImageError};
use posture_stream::{
    AnnotationStep, INACTIVE_MESSAGE, PumpExit, STOPPED_MESSAGE, StreamConfig, StreamController, StreamPump,
    StreamStatus,
};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{Duration, sleep, timeout};

fn fast_config() -> StreamConfig {
    StreamConfig::default()
        .with_frame_interval(Duration::from_millis(10))
        .with_idle_interval(Duration::from_millis(10))
        .with_resize(None)
}

fn setup(
    ending: Ending,
    detector: Arc<dyn Detector>,
    encoder: Arc<dyn FrameEncoder>,
) -> (Arc<StreamController>, Arc<AnnotationStep>, Counters) {
    let opener = CountingOpener::new(ending);
    let counters = opener.counters.clone();
    let controller = Arc::new(StreamController::new(Arc::new(opener), stub_descriptor()));
    let annotator = Arc::new(AnnotationStep::new(detector, encoder));
    (controller, annotator, counters)
}

fn marker_setup(ending: Ending) -> (Arc<StreamController>, Arc<AnnotationStep>, Counters) {
    setup(ending, Arc::new(StubDetector::empty()), Arc::new(MarkerEncoder))
}

#[tokio::test]
async fn test_polls_while_inactive() {
    let (controller, annotator, counters) = marker_setup(Ending::Endless);
    let (mut transport, peer) = MockTransport::new();
    let mut pump = StreamPump::new(controller.clone(), annotator, fast_config());

    let task = tokio::spawn(async move { pump.run(&mut transport).await });
    sleep(Duration::from_millis(60)).await;
    peer.disconnect();

    let exit = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    assert_eq!(exit, PumpExit::TransportClosed);
    let texts = peer.texts();
    assert!(texts.len() >= 2, "{texts:?}");
    assert!(texts.iter().all(|t| t == INACTIVE_MESSAGE));
    assert!(peer.binaries().is_empty());
    assert_eq!(counters.opens(), 0);
}

#[tokio::test]
async fn test_streams_frames_in_order_at_capped_rate() {
    let (controller, annotator, counters) = marker_setup(Ending::EndOfStream(5));
    let config = fast_config().with_frame_interval(Duration::from_millis(30));
    let (mut transport, peer) = MockTransport::new();
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, config);
    let exit = pump.run(&mut transport).await;

    assert_eq!(exit, PumpExit::SourceEnded);
    assert_eq!(peer.binaries(), vec![vec![0], vec![1], vec![2], vec![3], vec![4]]);
    assert_eq!(peer.texts(), vec![STOPPED_MESSAGE.to_string()]);
    assert_eq!(pump.frames_sent(), 5);

    let times: Vec<_> = peer.timed().into_iter().map(|(at, _)| at).collect();
    assert!(times[4].duration_since(times[0]) >= Duration::from_millis(120));

    assert_eq!(controller.status(), StreamStatus::Stopped);
    assert_eq!(counters.close_calls(), 1);
    assert_eq!(counters.open_handles(), 0);
}

#[tokio::test]
async fn test_read_failure_stops_session() {
    let (controller, annotator, counters) = marker_setup(Ending::ReadError(2));
    let (mut transport, peer) = MockTransport::new();
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, fast_config());
    let exit = pump.run(&mut transport).await;

    assert_eq!(exit, PumpExit::SourceEnded);
    assert_eq!(peer.binaries().len(), 2);
    assert_eq!(peer.texts().last().map(String::as_str), Some(STOPPED_MESSAGE));
    assert_eq!(controller.status(), StreamStatus::Stopped);
    assert_eq!(counters.close_calls(), 1);
    assert_eq!(counters.reads(), 3);
}

#[tokio::test]
async fn test_send_failure_releases_source() {
    let (controller, annotator, counters) = marker_setup(Ending::Endless);
    let (transport, peer) = MockTransport::new();
    let mut transport = transport.close_after(3);
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, fast_config());
    let exit = pump.run(&mut transport).await;

    assert_eq!(exit, PumpExit::TransportClosed);
    assert_eq!(peer.binaries().len(), 3);
    assert_eq!(controller.status(), StreamStatus::Stopped);
    assert_eq!(counters.open_handles(), 0);
}

#[tokio::test]
async fn test_disconnect_during_pause() {
    let (controller, annotator, counters) = marker_setup(Ending::Endless);
    let config = fast_config().with_frame_interval(Duration::from_millis(500));
    let (mut transport, peer) = MockTransport::new();
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, config);
    let task = tokio::spawn(async move { pump.run(&mut transport).await });
    sleep(Duration::from_millis(50)).await;
    peer.disconnect();

    // well within one frame interval
    let exit = timeout(Duration::from_millis(250), task).await.unwrap().unwrap();
    assert_eq!(exit, PumpExit::TransportClosed);
    assert_eq!(controller.status(), StreamStatus::Stopped);
    assert_eq!(counters.open_handles(), 0);
    assert_eq!(counters.close_calls(), 1);
}

#[tokio::test]
async fn test_encode_failure_skips_frame() {
    let (controller, annotator, _) = setup(
        Ending::EndOfStream(5),
        Arc::new(StubDetector::empty()),
        Arc::new(FlakyEncoder { bad: vec![1, 3] }),
    );
    let (mut transport, peer) = MockTransport::new();
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, fast_config());
    let exit = pump.run(&mut transport).await;

    assert_eq!(exit, PumpExit::SourceEnded);
    assert_eq!(peer.binaries(), vec![vec![0], vec![2], vec![4]]);
    assert_eq!(pump.frames_sent(), 3);
    assert_eq!(pump.frames_skipped(), 2);
}

#[tokio::test]
async fn test_detector_not_ready_ends_session() {
    let (controller, annotator, counters) = setup(
        Ending::Endless,
        Arc::new(NotReadyDetector::new("model missing")),
        Arc::new(MarkerEncoder),
    );
    let (mut transport, peer) = MockTransport::new();
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, fast_config());
    let exit = pump.run(&mut transport).await;

    assert_eq!(exit, PumpExit::DetectorNotReady);
    assert_eq!(peer.texts(), vec![STOPPED_MESSAGE.to_string()]);
    assert!(peer.binaries().is_empty());
    assert_eq!(controller.status(), StreamStatus::Stopped);
    assert_eq!(counters.open_handles(), 0);
}

#[tokio::test]
async fn test_shutdown_signal() {
    let (controller, annotator, counters) = marker_setup(Ending::Endless);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (mut transport, _peer) = MockTransport::new();
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, fast_config()).with_shutdown(shutdown_rx);
    let task = tokio::spawn(async move { pump.run(&mut transport).await });
    sleep(Duration::from_millis(40)).await;
    shutdown_tx.send_replace(true);

    let exit = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    assert_eq!(exit, PumpExit::Shutdown);
    assert_eq!(controller.status(), StreamStatus::Stopped);
    assert_eq!(counters.open_handles(), 0);
}

#[tokio::test]
async fn test_external_stop_returns_to_polling() {
    let (controller, annotator, counters) = marker_setup(Ending::Endless);
    let (mut transport, peer) = MockTransport::new();
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, fast_config());
    let task = tokio::spawn(async move { pump.run(&mut transport).await });
    sleep(Duration::from_millis(50)).await;
    controller.stop();
    sleep(Duration::from_millis(50)).await;
    assert_eq!(counters.open_handles(), 0);
    peer.disconnect();

    let exit = timeout(Duration::from_secs(1), task).await.unwrap().unwrap();
    assert_eq!(exit, PumpExit::TransportClosed);
    assert!(!peer.binaries().is_empty());
    assert!(peer.texts().iter().any(|t| t == INACTIVE_MESSAGE));
    assert!(!peer.texts().iter().any(|t| t == STOPPED_MESSAGE));
}

struct SizeEncoder;

impl FrameEncoder for SizeEncoder {
    fn encode(&self, frame: &Frame) -> Result<Vec<u8>, ImageError> {
        Ok(vec![frame.width() as u8, frame.height() as u8])
    }
}

#[tokio::test]
async fn test_frames_resized_before_annotation() {
    let (controller, annotator, _) = setup(
        Ending::EndOfStream(1),
        Arc::new(StubDetector::empty()),
        Arc::new(SizeEncoder),
    );
    let (mut transport, peer) = MockTransport::new();
    controller.start().unwrap();

    let config = fast_config().with_resize(Some((32, 24)));
    let mut pump = StreamPump::new(controller.clone(), annotator, config);
    pump.run(&mut transport).await;

    assert_eq!(peer.binaries(), vec![vec![32, 24]]);
}

#[tokio::test]
async fn test_source_panic_ends_session() {
    let (controller, annotator, counters) = marker_setup(Ending::Panic(2));
    let (mut transport, peer) = MockTransport::new();
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, fast_config());
    let exit = pump.run(&mut transport).await;

    assert_eq!(exit, PumpExit::SourceEnded);
    assert_eq!(peer.binaries().len(), 2);
    assert_eq!(peer.texts().last().map(String::as_str), Some(STOPPED_MESSAGE));
    assert_eq!(controller.status(), StreamStatus::Stopped);
    assert_eq!(counters.open_handles(), 0);
}

struct PanickingDetector;

impl Detector for PanickingDetector {
    fn name(&self) -> &str {
        "panicking"
    }

    fn process(&self, _frame: &Frame, _confidence_threshold: f32) -> Result<Vec<Detection>, DetectError> {
        panic!("inference crashed")
    }
}

#[tokio::test]
async fn test_panicking_pump_still_stops_session() {
    let (controller, annotator, counters) = setup(
        Ending::Endless,
        Arc::new(PanickingDetector),
        Arc::new(MarkerEncoder),
    );
    let (mut transport, _peer) = MockTransport::new();
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, fast_config());
    let task = tokio::spawn(async move { pump.run(&mut transport).await });

    let joined = timeout(Duration::from_secs(1), task).await.unwrap();
    assert!(joined.unwrap_err().is_panic());
    assert_eq!(controller.status(), StreamStatus::Stopped);
    assert_eq!(counters.open_handles(), 0);
}

#[tokio::test]
async fn test_aborted_pump_stops_session() {
    let (controller, annotator, counters) = marker_setup(Ending::Endless);
    let (mut transport, peer) = MockTransport::new();
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, fast_config());
    let task = tokio::spawn(async move { pump.run(&mut transport).await });
    sleep(Duration::from_millis(40)).await;
    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    // a read in flight at abort time finishes the release when it returns
    let released = async {
        while controller.status() != StreamStatus::Stopped || counters.open_handles() != 0 {
            sleep(Duration::from_millis(5)).await;
        }
    };
    timeout(Duration::from_millis(500), released).await.expect("session not released");
    assert!(!peer.binaries().is_empty());
}

/// Restarts the stream from inside detection, then reports the model missing.
struct RestartingDetector {
    controller: Arc<StreamController>,
}

impl Detector for RestartingDetector {
    fn name(&self) -> &str {
        "restarting"
    }

    fn process(&self, _frame: &Frame, _confidence_threshold: f32) -> Result<Vec<Detection>, DetectError> {
        self.controller.stop();
        let _ = self.controller.start();
        Err(DetectError::NotReady("model missing".to_string()))
    }
}

#[tokio::test]
async fn test_not_ready_detector_spares_newer_session() {
    let opener = CountingOpener::new(Ending::Endless);
    let counters = opener.counters.clone();
    let controller = Arc::new(StreamController::new(Arc::new(opener), stub_descriptor()));
    let detector = Arc::new(RestartingDetector {
        controller: controller.clone(),
    });
    let annotator = Arc::new(AnnotationStep::new(detector, Arc::new(MarkerEncoder)));
    let (mut transport, peer) = MockTransport::new();
    controller.start().unwrap();

    let mut pump = StreamPump::new(controller.clone(), annotator, fast_config());
    let exit = pump.run(&mut transport).await;

    assert_eq!(exit, PumpExit::DetectorNotReady);
    assert_eq!(peer.texts(), vec![STOPPED_MESSAGE.to_string()]);
    assert_eq!(controller.status(), StreamStatus::Active);
    assert_eq!(controller.current_source().unwrap().generation, 2);
    assert_eq!(counters.open_handles(), 1);
    controller.stop();
}
