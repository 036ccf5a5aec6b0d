// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the camera texture pipeline, driven through the
//! synthetic provider in manual delivery mode

use camtex::backends::camera::types::{BackendError, SessionInterruption};
use camtex::backends::camera::{DeliveryMode, SyntheticProvider};
use camtex::texture::{CpuTexture, CpuTextureFactory, TextureFactory};
use camtex::{
    CameraDevice, CameraPosition, CameraSelection, CameraTexturePipeline, CaptureConfiguration,
    CapturePreset, CaptureState, CapturedFrame, FrameError, PipelineError, PipelineEvent,
    PixelFormat, TextureError,
};
use image::RgbaImage;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

const WIDTH: u32 = 32;
const HEIGHT: u32 = 16;

/// RGBA buffer whose every byte encodes the frame timestamp
fn solid(value: u8) -> Vec<u8> {
    vec![value; (WIDTH * HEIGHT * 4) as usize]
}

fn frame(data: &[u8], millis: u64) -> CapturedFrame<'_> {
    CapturedFrame::packed(
        data,
        WIDTH,
        HEIGHT,
        PixelFormat::RGBA,
        Duration::from_millis(millis),
    )
}

fn back_medium() -> CaptureConfiguration {
    CaptureConfiguration::new(
        CapturePreset::Medium,
        CameraSelection::Position(CameraPosition::Back),
    )
}

fn setup() -> (Arc<SyntheticProvider>, CameraTexturePipeline<CpuTextureFactory>) {
    let provider = Arc::new(SyntheticProvider::manual());
    let pipeline =
        CameraTexturePipeline::create(provider.clone(), back_medium(), CpuTextureFactory::new())
            .unwrap();
    (provider, pipeline)
}

fn current_millis(pipeline: &CameraTexturePipeline<CpuTextureFactory>) -> Option<u128> {
    pipeline
        .current_texture()
        .map(|current| current.timestamp().as_millis())
}

#[test]
fn test_back_medium_scenario() {
    let (provider, pipeline) = setup();
    assert_eq!(pipeline.device().position, CameraPosition::Back);
    assert_eq!(pipeline.state(), CaptureState::Idle);
    assert!(pipeline.current_texture().is_none());

    pipeline.start_capture().unwrap();
    assert_eq!(pipeline.state(), CaptureState::Running);

    let f1 = solid(10);
    provider.deliver(&frame(&f1, 10));
    assert_eq!(current_millis(&pipeline), Some(10));

    let f2 = solid(20);
    provider.deliver(&frame(&f2, 20));
    assert_eq!(current_millis(&pipeline), Some(20));

    pipeline.stop_capture().unwrap();
    assert_eq!(pipeline.state(), CaptureState::Idle);

    let current = pipeline.current_texture().unwrap();
    assert_eq!(current.timestamp(), Duration::from_millis(20));
    assert_eq!(current.texture().sample(0, 0), [20, 20, 20, 20]);
    assert_eq!((current.width(), current.height()), (WIDTH, HEIGHT));
}

#[test]
fn test_start_twice_opens_one_session() {
    let (provider, pipeline) = setup();
    pipeline.start_capture().unwrap();
    let session = pipeline.session_id();
    pipeline.start_capture().unwrap();

    assert_eq!(provider.sessions_opened(), 1);
    assert_eq!(provider.active_sessions(), 1);
    assert_eq!(pipeline.session_id(), session);
    assert_eq!(pipeline.stats().sessions_opened, 1);
}

#[test]
fn test_stop_while_idle_is_noop() {
    let (provider, pipeline) = setup();
    pipeline.stop_capture().unwrap();
    pipeline.stop_capture().unwrap();
    assert_eq!(pipeline.state(), CaptureState::Idle);
    assert_eq!(provider.sessions_opened(), 0);
}

#[test]
fn test_restart_republishes_fresh_texture() {
    let (provider, pipeline) = setup();
    pipeline.start_capture().unwrap();
    let before = solid(1);
    provider.deliver(&frame(&before, 1));
    let first_sequence = pipeline.current_texture().unwrap().sequence();

    pipeline.stop_capture().unwrap();
    assert_eq!(provider.active_sessions(), 0);

    // Frames after stop are ignored
    assert_eq!(provider.deliver(&frame(&before, 2)), 0);
    assert_eq!(current_millis(&pipeline), Some(1));

    pipeline.start_capture().unwrap();
    assert_eq!(pipeline.state(), CaptureState::Running);
    assert_eq!(provider.sessions_opened(), 2);

    let after = solid(3);
    provider.deliver(&frame(&after, 3));
    let current = pipeline.current_texture().unwrap();
    assert_eq!(current.timestamp(), Duration::from_millis(3));
    assert!(current.sequence() > first_sequence);
}

#[test]
fn test_unsupported_frame_keeps_texture_and_state() {
    let (provider, pipeline) = setup();
    pipeline.start_capture().unwrap();
    let good = solid(5);
    provider.deliver(&frame(&good, 5));

    let jpeg = vec![0xFFu8; 128];
    let mjpeg = CapturedFrame::packed(
        &jpeg,
        WIDTH,
        HEIGHT,
        PixelFormat::MJPEG,
        Duration::from_millis(6),
    );
    provider.deliver(&mjpeg);

    assert_eq!(pipeline.state(), CaptureState::Running);
    assert_eq!(current_millis(&pipeline), Some(5));
    let stats = pipeline.stats();
    assert_eq!(stats.unsupported, 1);
    assert_eq!(stats.published, 1);
}

#[test]
fn test_truncated_frame_is_dropped() {
    let (provider, pipeline) = setup();
    pipeline.start_capture().unwrap();

    let short = vec![0u8; 16];
    provider.deliver(&frame(&short, 1));

    assert!(pipeline.current_texture().is_none());
    assert_eq!(pipeline.state(), CaptureState::Running);
    assert_eq!(pipeline.stats().conversion_failures, 1);
}

#[test]
fn test_oversized_frame_header_is_dropped() {
    let (provider, pipeline) = setup();
    pipeline.start_capture().unwrap();

    let data = [0u8; 16];
    let huge = CapturedFrame {
        width: 4_000_000_000,
        height: 4_000_000_000,
        format: PixelFormat::Gray8,
        stride: 4_000_000_000,
        planes: None,
        timestamp: Duration::from_millis(1),
        data: &data,
    };
    provider.deliver(&huge);
    let wide = CapturedFrame {
        width: u32::MAX,
        stride: u32::MAX,
        ..frame(&data, 2)
    };
    provider.deliver(&wide);

    assert!(pipeline.current_texture().is_none());
    assert_eq!(pipeline.state(), CaptureState::Running);
    assert_eq!(pipeline.stats().conversion_failures, 2);

    // Capture carries on with the next good frame
    let good = solid(3);
    provider.deliver(&frame(&good, 3));
    assert_eq!(current_millis(&pipeline), Some(3));
}

#[test]
fn test_yuv_frames_are_converted() {
    let (provider, pipeline) = setup();
    pipeline.start_capture().unwrap();

    // Neutral chroma, luma 128: mid gray
    let mut nv12 = vec![128u8; 4 * 4];
    nv12.extend_from_slice(&[128u8; 4 * 2]);
    let frame = CapturedFrame::packed(&nv12, 4, 4, PixelFormat::NV12, Duration::from_millis(1));
    provider.deliver(&frame);

    let current = pipeline.current_texture().unwrap();
    assert_eq!((current.width(), current.height()), (4, 4));
    let [r, g, b, a] = current.texture().sample(3, 3);
    assert_eq!(a, 255);
    assert!(r.abs_diff(128) <= 1 && g.abs_diff(128) <= 1 && b.abs_diff(128) <= 1);
}

#[test]
fn test_missing_camera_is_device_unavailable() {
    let provider = Arc::new(SyntheticProvider::new(
        vec![CameraDevice::new(
            "Front only",
            "synthetic:0",
            CameraPosition::Front,
        )],
        DeliveryMode::Manual,
    ));

    let result = CameraTexturePipeline::create(provider, back_medium(), CpuTextureFactory::new());
    assert_eq!(
        result.err(),
        Some(PipelineError::DeviceUnavailable(CameraSelection::Position(
            CameraPosition::Back
        )))
    );
}

#[test]
fn test_select_camera_by_device_path() {
    let provider = Arc::new(SyntheticProvider::manual());
    let configuration = CaptureConfiguration::new(
        CapturePreset::Low,
        CameraSelection::Device("synthetic:0".to_string()),
    );
    let pipeline =
        CameraTexturePipeline::create(provider, configuration, CpuTextureFactory::new()).unwrap();
    assert_eq!(pipeline.device().position, CameraPosition::Front);
    assert_eq!(pipeline.configuration().preset, CapturePreset::Low);
}

#[test]
fn test_open_failure_is_session_configuration() {
    let (provider, pipeline) = setup();
    provider.fail_next_open(BackendError::PermissionDenied("camera access denied".into()));

    let result = pipeline.start_capture();
    assert_eq!(
        result,
        Err(PipelineError::SessionConfiguration(
            BackendError::PermissionDenied("camera access denied".into())
        ))
    );
    assert_eq!(pipeline.state(), CaptureState::Idle);
    assert!(pipeline.session_id().is_none());

    // Not sticky: the next attempt succeeds
    pipeline.start_capture().unwrap();
    assert_eq!(pipeline.state(), CaptureState::Running);
}

#[test]
fn test_busy_device_is_session_configuration() {
    let provider = Arc::new(SyntheticProvider::manual());
    let first =
        CameraTexturePipeline::create(provider.clone(), back_medium(), CpuTextureFactory::new())
            .unwrap();
    let second =
        CameraTexturePipeline::create(provider.clone(), back_medium(), CpuTextureFactory::new())
            .unwrap();

    first.start_capture().unwrap();
    assert!(matches!(
        second.start_capture(),
        Err(PipelineError::SessionConfiguration(BackendError::DeviceBusy(_)))
    ));
    assert_eq!(second.state(), CaptureState::Idle);

    drop(first);
    second.start_capture().unwrap();
}

#[test]
fn test_interruption_goes_idle_and_keeps_texture() {
    let (provider, pipeline) = setup();
    let mut events = pipeline.subscribe();
    pipeline.start_capture().unwrap();
    let opened = pipeline.session_id();
    assert!(opened.is_some());
    let data = solid(42);
    provider.deliver(&frame(&data, 42));

    assert_eq!(provider.interrupt(SessionInterruption::DeviceDisconnected), 1);
    assert_eq!(pipeline.state(), CaptureState::Idle);
    assert_eq!(current_millis(&pipeline), Some(42));
    assert_eq!(pipeline.stats().interruptions, 1);

    let mut received = Vec::new();
    while let Ok(event) = events.try_recv() {
        received.push(event);
    }
    let went_idle = received.iter().position(|event| {
        *event
            == PipelineEvent::StateChanged {
                from: CaptureState::Running,
                to: CaptureState::Idle,
            }
    });
    let interrupted = received
        .iter()
        .position(|event| matches!(event, PipelineEvent::Interrupted { .. }));
    assert!(went_idle.expect("idle transition") < interrupted.expect("interruption event"));

    let Some(PipelineEvent::Interrupted { session, reason }) = interrupted.map(|i| received[i].clone())
    else {
        panic!("interruption event");
    };
    assert_eq!(reason, SessionInterruption::DeviceDisconnected);
    assert_eq!(session, opened);
    assert!(pipeline.session_id().is_none());

    // Stop after an interruption releases the dead session without error
    pipeline.stop_capture().unwrap();
    assert_eq!(provider.active_sessions(), 0);
}

#[test]
fn test_restart_after_interruption() {
    let (provider, pipeline) = setup();
    pipeline.start_capture().unwrap();
    provider.interrupt(SessionInterruption::SessionInterrupted("pipeline error".into()));
    assert_eq!(pipeline.state(), CaptureState::Idle);

    pipeline.start_capture().unwrap();
    assert_eq!(pipeline.state(), CaptureState::Running);
    assert_eq!(provider.sessions_opened(), 2);
    assert_eq!(provider.active_sessions(), 1);

    let data = solid(7);
    provider.deliver(&frame(&data, 7));
    assert_eq!(current_millis(&pipeline), Some(7));
}

#[test]
fn test_drop_releases_session() {
    let (provider, pipeline) = setup();
    pipeline.start_capture().unwrap();
    assert_eq!(provider.active_sessions(), 1);
    drop(pipeline);
    assert_eq!(provider.active_sessions(), 0);
}

/// Wraps the CPU engine and parks the first conversion until released
struct GatedFactory {
    inner: CpuTextureFactory,
    armed: AtomicBool,
    entered: Mutex<mpsc::Sender<()>>,
    gate: Mutex<mpsc::Receiver<()>>,
}

impl TextureFactory for GatedFactory {
    type Texture = CpuTexture;

    fn create_texture(&self, image: RgbaImage) -> Result<CpuTexture, TextureError> {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.entered.lock().unwrap().send(()).unwrap();
            self.gate.lock().unwrap().recv().unwrap();
        }
        self.inner.create_texture(image)
    }

    fn name(&self) -> &'static str {
        "gated"
    }
}

#[test]
fn test_frames_during_conversion_latest_wins() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel();
    let provider = Arc::new(SyntheticProvider::manual());
    let pipeline = CameraTexturePipeline::create(
        provider.clone(),
        back_medium(),
        GatedFactory {
            inner: CpuTextureFactory::new(),
            armed: AtomicBool::new(true),
            entered: Mutex::new(entered_tx),
            gate: Mutex::new(gate_rx),
        },
    )
    .unwrap();
    pipeline.start_capture().unwrap();

    let delivering = {
        let provider = provider.clone();
        thread::spawn(move || {
            let f1 = solid(1);
            provider.deliver(&frame(&f1, 1));
        })
    };
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // Conversion of F1 is in flight: these are staged, F3 replaces F2
    let f2 = solid(2);
    let f3 = solid(3);
    provider.deliver(&frame(&f2, 2));
    provider.deliver(&frame(&f3, 3));
    assert!(pipeline.current_texture().is_none());

    gate_tx.send(()).unwrap();
    delivering.join().unwrap();

    let current = pipeline.current_texture().unwrap();
    assert_eq!(current.timestamp(), Duration::from_millis(3));
    assert_eq!(current.texture().sample(0, 0), [3, 3, 3, 3]);

    let stats = pipeline.stats();
    assert_eq!(stats.delivered, 3);
    assert_eq!(stats.superseded, 1);
    assert_eq!(stats.published, 2);
}

#[test]
fn test_stop_does_not_wait_for_conversion_in_flight() {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (gate_tx, gate_rx) = mpsc::channel();
    let provider = Arc::new(SyntheticProvider::manual());
    let pipeline = CameraTexturePipeline::create(
        provider.clone(),
        back_medium(),
        GatedFactory {
            inner: CpuTextureFactory::new(),
            armed: AtomicBool::new(true),
            entered: Mutex::new(entered_tx),
            gate: Mutex::new(gate_rx),
        },
    )
    .unwrap();
    pipeline.start_capture().unwrap();

    let delivering = {
        let provider = provider.clone();
        thread::spawn(move || {
            let f1 = solid(1);
            provider.deliver(&frame(&f1, 1));
        })
    };
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    // The conversion of F1 is parked in the texture engine
    pipeline.stop_capture().unwrap();
    assert_eq!(pipeline.state(), CaptureState::Idle);
    assert_eq!(provider.active_sessions(), 0);

    gate_tx.send(()).unwrap();
    delivering.join().unwrap();

    assert!(pipeline.current_texture().is_none());
    assert_eq!(pipeline.state(), CaptureState::Idle);
    let stats = pipeline.stats();
    assert_eq!(stats.abandoned, 1);
    assert_eq!(stats.published, 0);
}

#[test]
fn test_concurrent_readers_never_see_torn_texture() {
    let (provider, pipeline) = setup();
    let pipeline = Arc::new(pipeline);
    pipeline.start_capture().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let reads = Arc::new(AtomicU64::new(0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let done = Arc::clone(&done);
            let reads = Arc::clone(&reads);
            thread::spawn(move || {
                let mut last_sequence = 0;
                while !done.load(Ordering::Acquire) {
                    let Some(current) = pipeline.current_texture() else {
                        continue;
                    };
                    assert!(current.sequence() >= last_sequence);
                    last_sequence = current.sequence();

                    let expected = (current.timestamp().as_millis() % 256) as u8;
                    assert!(
                        current.texture().as_raw().iter().all(|&b| b == expected),
                        "texture does not match its timestamp"
                    );
                    reads.fetch_add(1, Ordering::Relaxed);
                }
            })
        })
        .collect();

    let writer = {
        let provider = Arc::clone(&provider);
        thread::spawn(move || {
            for i in 0..500u64 {
                let data = solid((i % 256) as u8);
                provider.deliver(&frame(&data, i));
            }
        })
    };

    writer.join().unwrap();
    done.store(true, Ordering::Release);
    for reader in readers {
        reader.join().unwrap();
    }

    assert_eq!(current_millis(&pipeline), Some(499));
    assert!(reads.load(Ordering::Relaxed) > 0);
}

#[test]
fn test_test_pattern_provider_feeds_pipeline() {
    let provider = Arc::new(SyntheticProvider::new(
        SyntheticProvider::default_cameras(),
        DeliveryMode::TestPattern {
            format: PixelFormat::YUYV,
        },
    ));
    let configuration = CaptureConfiguration::new(
        CapturePreset::Low,
        CameraSelection::Position(CameraPosition::Front),
    );
    let pipeline =
        CameraTexturePipeline::create(provider.clone(), configuration, CpuTextureFactory::new())
            .unwrap();
    pipeline.start_capture().unwrap();

    let mut current = None;
    for _ in 0..200 {
        current = pipeline.current_texture();
        if current.is_some() {
            break;
        }
        thread::sleep(Duration::from_millis(10));
    }
    pipeline.stop_capture().unwrap();

    let current = current.expect("test pattern texture");
    assert_eq!(
        (current.width(), current.height()),
        CapturePreset::Low.resolution()
    );
    assert_eq!(provider.active_sessions(), 0);
}

#[tokio::test]
async fn test_events_follow_lifecycle() {
    let (provider, pipeline) = setup();
    let mut events = pipeline.subscribe();

    pipeline.start_capture().unwrap();
    let data = solid(9);
    provider.deliver(&frame(&data, 9));
    let jpeg = [0u8; 4];
    provider.deliver(&CapturedFrame::packed(
        &jpeg,
        2,
        2,
        PixelFormat::MJPEG,
        Duration::from_millis(10),
    ));
    pipeline.stop_capture().unwrap();

    let mut received = Vec::new();
    for _ in 0..5 {
        let event = tokio::time::timeout(Duration::from_secs(1), events.recv())
            .await
            .expect("event in time")
            .expect("channel open");
        received.push(event);
    }

    assert_eq!(
        received,
        vec![
            PipelineEvent::StateChanged {
                from: CaptureState::Idle,
                to: CaptureState::Running
            },
            PipelineEvent::TextureUpdated {
                sequence: 1,
                timestamp: Duration::from_millis(9),
                width: WIDTH,
                height: HEIGHT
            },
            PipelineEvent::FrameDropped {
                timestamp: Duration::from_millis(10),
                error: FrameError::UnsupportedFormat(PixelFormat::MJPEG)
            },
            PipelineEvent::StateChanged {
                from: CaptureState::Running,
                to: CaptureState::Stopping
            },
            PipelineEvent::StateChanged {
                from: CaptureState::Stopping,
                to: CaptureState::Idle
            },
        ]
    );
}
