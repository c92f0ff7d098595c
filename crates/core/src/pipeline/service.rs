use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, Sender};
use thiserror::Error;

use crate::capture::capture_loop::{CaptureConfig, CaptureLoop};
use crate::capture::domain::camera_source::{
    open_with_fallback, CameraError, CameraProvider, CameraRequest,
};
use crate::capture::domain::face_locator::FaceLocator;
use crate::capture::domain::overlay_sink::OverlaySink;
use crate::capture::domain::pose_estimator::PoseEstimator;
use crate::capture::domain::short_term_tracker::TrackerFactory;
use crate::pipeline::events::ServiceEvent;
use crate::pipeline::recognition_worker::RecognitionWorker;
use crate::pipeline::scheduler::RecognitionScheduler;
use crate::pipeline::status_flags::StatusFlags;
use crate::recognition::domain::face_encoder::FaceEncoder;
use crate::recognition::identity_store::{IdentityStore, KnownIdentities, StoreError};
use crate::recognition::recognizer::{
    IdentitySnapshot, RecognitionResult, Recognizer, SharedIdentities,
};
use crate::shared::constants::{
    DEFAULT_CAMERA_HEIGHT, DEFAULT_CAMERA_WIDTH, DEFAULT_CAPTURE_FPS, DEFAULT_DETECT_SCALE,
    DEFAULT_DISPLAY_FPS, DEFAULT_FRONTALITY_THRESHOLD, DEFAULT_LOCKOUT,
    DEFAULT_MIN_FACE_AREA_RATIO, DEFAULT_POSE_STRIDE, DEFAULT_RECOGNITION_THRESHOLD,
    MIN_POSE_SAMPLES, POSE_BUFFER_CAPACITY,
};
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Camera(#[from] CameraError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("no camera initialized")]
    NotInitialized,
    #[error("service is not running")]
    NotRunning,
    #[error("recognition failed: {0}")]
    Recognition(String),
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub camera_index: u32,
    pub camera_width: u32,
    pub camera_height: u32,
    pub capture_fps: u32,
    pub display_fps: u32,
    pub detect_scale: f64,
    pub pose_stride: u64,
    pub recognition_threshold: f32,
    pub frontality_threshold: f32,
    pub min_face_area_ratio: f32,
    pub lockout: Duration,
    pub store_path: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            camera_index: 0,
            camera_width: DEFAULT_CAMERA_WIDTH,
            camera_height: DEFAULT_CAMERA_HEIGHT,
            capture_fps: DEFAULT_CAPTURE_FPS,
            display_fps: DEFAULT_DISPLAY_FPS,
            detect_scale: DEFAULT_DETECT_SCALE,
            pose_stride: DEFAULT_POSE_STRIDE,
            recognition_threshold: DEFAULT_RECOGNITION_THRESHOLD,
            frontality_threshold: DEFAULT_FRONTALITY_THRESHOLD,
            min_face_area_ratio: DEFAULT_MIN_FACE_AREA_RATIO,
            lockout: DEFAULT_LOCKOUT,
            store_path: PathBuf::from("identities.fgid"),
        }
    }
}

/// Pluggable backends behind the service, one per capability trait.
///
/// `capture_locator` and `recognition_locator` are separate instances because
/// they run on different threads.
pub struct ServiceBackends {
    pub camera_provider: Box<dyn CameraProvider>,
    pub capture_locator: Box<dyn FaceLocator>,
    pub recognition_locator: Box<dyn FaceLocator>,
    pub pose_estimator: Box<dyn PoseEstimator>,
    pub tracker_factory: Box<dyn TrackerFactory>,
    pub encoder: Box<dyn FaceEncoder>,
    pub overlay: Option<Box<dyn OverlaySink>>,
}

/// Receives frames for presentation; returning `false` requests exit.
pub trait DisplaySink: Send {
    fn show(
        &mut self,
        frame: &Frame,
        result: Option<&RecognitionResult>,
    ) -> Result<bool, Box<dyn std::error::Error>>;
}

/// A point-in-time view of the service configuration and state.
#[derive(Clone, Debug, PartialEq)]
pub struct ServiceStats {
    pub known_identities: usize,
    pub recognition_threshold: f32,
    pub frontality_threshold: f32,
    pub min_face_area_ratio: f32,
    pub capture_fps: u32,
    pub display_fps: u32,
    pub tracker_active: bool,
}

/// The orchestration facade: owns the capture loop, the recognition worker,
/// the shared flags and the identity snapshot, and exposes the public
/// operations.
///
/// While running, the `CaptureLoop` lives on its thread and is reclaimed
/// (with its camera) when the thread joins.
pub struct RecognitionService {
    config: ServiceConfig,
    flags: Arc<StatusFlags>,
    scheduler: RecognitionScheduler,
    recognizer: Arc<Mutex<Recognizer>>,
    identities: SharedIdentities,
    store: IdentityStore,
    last_frame: Arc<Mutex<Option<Frame>>>,
    last_result: Arc<Mutex<Option<RecognitionResult>>>,
    events_tx: Sender<ServiceEvent>,
    events_rx: Receiver<ServiceEvent>,
    camera_provider: Box<dyn CameraProvider>,
    capture: Option<CaptureLoop>,
    capture_handle: Option<JoinHandle<CaptureLoop>>,
    worker_handle: Option<JoinHandle<()>>,
}

impl RecognitionService {
    pub fn new(config: ServiceConfig, backends: ServiceBackends) -> Self {
        let flags = Arc::new(StatusFlags::new());
        let scheduler = RecognitionScheduler::new();
        let identities: SharedIdentities = Arc::new(RwLock::new(IdentitySnapshot::empty()));
        let store = IdentityStore::new(config.store_path.clone());
        let last_frame = Arc::new(Mutex::new(None));
        let last_result = Arc::new(Mutex::new(None));
        let (events_tx, events_rx) = unbounded();

        let recognizer = Arc::new(Mutex::new(Recognizer::new(
            backends.recognition_locator,
            backends.encoder,
            identities.clone(),
            config.recognition_threshold,
        )));

        let capture = CaptureLoop::new(
            CaptureConfig {
                capture_fps: config.capture_fps,
                detect_scale: config.detect_scale,
                pose_stride: config.pose_stride,
                frontality_threshold: config.frontality_threshold,
                min_face_area_ratio: config.min_face_area_ratio,
                min_pose_samples: MIN_POSE_SAMPLES,
                pose_buffer_capacity: POSE_BUFFER_CAPACITY,
            },
            backends.capture_locator,
            backends.pose_estimator,
            backends.tracker_factory,
            backends.overlay,
            scheduler.submit_handle(),
            flags.clone(),
            last_frame.clone(),
            events_tx.clone(),
        );

        let mut service = Self {
            config,
            flags,
            scheduler,
            recognizer,
            identities,
            store,
            last_frame,
            last_result,
            events_tx,
            events_rx,
            camera_provider: backends.camera_provider,
            capture: Some(capture),
            capture_handle: None,
            worker_handle: None,
        };

        // A missing or unreadable store is not fatal at construction; the
        // service starts with an empty identity set.
        match service.reload_identities() {
            Ok(count) => log::info!("loaded {count} known identities"),
            Err(e) => log::warn!("identity store not loaded: {e}"),
        }
        service
    }

    /// Opens the configured camera, scanning fallback indices on failure.
    /// Returns the index that actually opened.
    pub fn initialize_camera(&mut self) -> Result<u32, ServiceError> {
        let request = CameraRequest {
            index: self.config.camera_index,
            width: self.config.camera_width,
            height: self.config.camera_height,
            fps: self.config.capture_fps,
        };
        let (source, index) = open_with_fallback(self.camera_provider.as_ref(), &request)?;
        let capture = self
            .capture
            .as_mut()
            .ok_or_else(|| ServiceError::Internal("capture loop is detached".into()))?;
        capture.set_camera(source);
        log::info!("camera initialized on index {index}");
        Ok(index)
    }

    /// Starts the capture and worker threads. A no-op when already running.
    pub fn start(&mut self) -> Result<(), ServiceError> {
        if self.flags.is_running() {
            log::debug!("start ignored: already running");
            return Ok(());
        }
        let capture = self.capture.take().ok_or(ServiceError::NotInitialized)?;
        if !capture.has_camera() {
            self.capture = Some(capture);
            return Err(ServiceError::NotInitialized);
        }

        self.scheduler.drain();
        self.flags.reset_pipeline_state();
        self.flags.set_running(true);

        let worker = RecognitionWorker::new(
            self.scheduler.receiver(),
            self.recognizer.clone(),
            self.flags.clone(),
            self.last_result.clone(),
            self.events_tx.clone(),
            self.config.lockout,
        );
        self.worker_handle = Some(thread::spawn(move || worker.run()));
        self.capture_handle = Some(thread::spawn(move || capture.run()));
        log::info!("recognition service started");
        Ok(())
    }

    /// Signals shutdown and joins both threads, reclaiming the capture loop
    /// and its camera.
    ///
    /// Shutdown is cooperative: each loop observes the cleared running flag
    /// within one tick or the 100 ms request timeout. The join itself is
    /// unbounded and relies on backend calls returning; a `CameraSource::read`
    /// that blocks forever would hang `stop`.
    pub fn stop(&mut self) {
        if !self.flags.is_running() && self.capture_handle.is_none() {
            return;
        }
        self.flags.set_running(false);
        if let Some(handle) = self.capture_handle.take() {
            match handle.join() {
                Ok(capture) => self.capture = Some(capture),
                Err(_) => log::error!("capture thread panicked"),
            }
        }
        if let Some(handle) = self.worker_handle.take() {
            if handle.join().is_err() {
                log::error!("recognition worker panicked");
            }
        }
        self.flags.reset_pipeline_state();
        log::info!("recognition service stopped");
    }

    pub fn is_running(&self) -> bool {
        self.flags.is_running()
    }

    /// Feeds cached frames to the sink at the display rate until the sink
    /// requests exit or the loops stop. Stops the service and releases the
    /// camera before returning.
    pub fn run_display_loop(&mut self, sink: &mut dyn DisplaySink) -> Result<(), ServiceError> {
        if !self.flags.is_running() {
            return Err(ServiceError::NotRunning);
        }
        let fps = self.config.display_fps.max(1);
        let interval = Duration::from_secs_f64(1.0 / fps as f64);
        let mut last_shown: Option<Instant> = None;

        while self.flags.is_running() {
            if let Some(t) = last_shown {
                if t.elapsed() < interval {
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
            }
            last_shown = Some(Instant::now());

            let frame = match self.last_frame.lock() {
                Ok(guard) => guard.clone(),
                Err(_) => None,
            };
            let Some(frame) = frame else {
                continue;
            };
            let result = if self.flags.result_displayed() {
                self.last_result.lock().ok().and_then(|g| g.clone())
            } else {
                None
            };
            match sink.show(&frame, result.as_ref()) {
                Ok(true) => {}
                Ok(false) => {
                    log::info!("display sink requested exit");
                    break;
                }
                Err(e) => {
                    log::warn!("display sink failed: {e}");
                    break;
                }
            }
        }

        self.stop();
        if let Some(capture) = self.capture.as_mut() {
            capture.release_camera();
        }
        Ok(())
    }

    /// Synchronous single-frame recognition, independent of the loops.
    pub fn process_frame(&self, frame: &Frame) -> Result<RecognitionResult, ServiceError> {
        let mut recognizer = self
            .recognizer
            .lock()
            .map_err(|_| ServiceError::Internal("recognizer lock poisoned".into()))?;
        recognizer
            .recognize(frame)
            .map_err(|e| ServiceError::Recognition(e.to_string()))
    }

    /// Reloads the identity set from the backing store and swaps the
    /// snapshot. Returns the number of identities loaded.
    pub fn reload_identities(&mut self) -> Result<usize, ServiceError> {
        let identities = self.store.load()?;
        self.install_identities(&identities)
    }

    /// Replaces the store contents with `bytes` and reloads. On failure the
    /// previous snapshot stays in effect.
    pub fn update_identities(&mut self, bytes: &[u8]) -> Result<usize, ServiceError> {
        let identities = self.store.update(bytes)?;
        self.install_identities(&identities)
    }

    fn install_identities(&self, identities: &KnownIdentities) -> Result<usize, ServiceError> {
        let snapshot = IdentitySnapshot::from_identities(identities);
        let count = snapshot.len();
        let mut guard = self
            .identities
            .write()
            .map_err(|_| ServiceError::Internal("identity snapshot lock poisoned".into()))?;
        *guard = snapshot;
        Ok(count)
    }

    pub fn stats(&self) -> ServiceStats {
        let known_identities = self.identities.read().map(|s| s.len()).unwrap_or(0);
        ServiceStats {
            known_identities,
            recognition_threshold: self.config.recognition_threshold,
            frontality_threshold: self.config.frontality_threshold,
            min_face_area_ratio: self.config.min_face_area_ratio,
            capture_fps: self.config.capture_fps,
            display_fps: self.config.display_fps,
            tracker_active: self.flags.tracker_active(),
        }
    }

    pub fn last_result(&self) -> Option<RecognitionResult> {
        self.last_result.lock().ok().and_then(|g| g.clone())
    }

    /// Out-of-band failure and result notifications.
    pub fn events(&self) -> Receiver<ServiceEvent> {
        self.events_rx.clone()
    }
}

impl Drop for RecognitionService {
    fn drop(&mut self) {
        self.stop();
    }
}
