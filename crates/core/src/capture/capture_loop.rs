use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::capture::domain::camera_source::CameraSource;
use crate::capture::domain::candidate_selector::{PoseBuffer, PoseSample};
use crate::capture::domain::face_locator::{self, FaceLocator};
use crate::capture::domain::overlay_sink::{OverlayBox, OverlaySink};
use crate::capture::domain::pose_estimator::PoseEstimator;
use crate::capture::domain::short_term_tracker::{ShortTermTracker, TrackerFactory};
use crate::pipeline::events::ServiceEvent;
use crate::pipeline::scheduler::SubmitHandle;
use crate::pipeline::status_flags::StatusFlags;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Tracker lifecycle: exactly one tracker exists while `Tracking`.
enum TrackState {
    Absent,
    Tracking(Box<dyn ShortTermTracker>),
}

#[derive(Clone, Debug)]
pub struct CaptureConfig {
    pub capture_fps: u32,
    pub detect_scale: f64,
    pub pose_stride: u64,
    pub frontality_threshold: f32,
    pub min_face_area_ratio: f32,
    pub min_pose_samples: usize,
    pub pose_buffer_capacity: usize,
}

/// The live video loop: reads frames, runs the tracker or the detector,
/// buffers pose samples, submits the best candidate crop, and publishes
/// overlay annotations.
///
/// Owns the camera, the tracker and the pose buffer exclusively; the only
/// data that leaves this loop are owned crops (via the scheduler) and owned
/// frame copies (via the shared last-frame cache).
pub struct CaptureLoop {
    config: CaptureConfig,
    camera: Option<Box<dyn CameraSource>>,
    locator: Box<dyn FaceLocator>,
    pose_estimator: Box<dyn PoseEstimator>,
    tracker_factory: Box<dyn TrackerFactory>,
    overlay: Option<Box<dyn OverlaySink>>,
    requests: SubmitHandle,
    flags: Arc<StatusFlags>,
    last_frame: Arc<Mutex<Option<Frame>>>,
    events: Sender<ServiceEvent>,
    state: TrackState,
    pose_buffer: PoseBuffer,
    tick_count: u64,
}

impl CaptureLoop {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: CaptureConfig,
        locator: Box<dyn FaceLocator>,
        pose_estimator: Box<dyn PoseEstimator>,
        tracker_factory: Box<dyn TrackerFactory>,
        overlay: Option<Box<dyn OverlaySink>>,
        requests: SubmitHandle,
        flags: Arc<StatusFlags>,
        last_frame: Arc<Mutex<Option<Frame>>>,
        events: Sender<ServiceEvent>,
    ) -> Self {
        let pose_buffer = PoseBuffer::new(config.pose_buffer_capacity);
        Self {
            config,
            camera: None,
            locator,
            pose_estimator,
            tracker_factory,
            overlay,
            requests,
            flags,
            last_frame,
            events,
            state: TrackState::Absent,
            pose_buffer,
            tick_count: 0,
        }
    }

    pub fn set_camera(&mut self, camera: Box<dyn CameraSource>) {
        self.camera = Some(camera);
    }

    pub fn has_camera(&self) -> bool {
        self.camera.is_some()
    }

    pub fn release_camera(&mut self) {
        self.camera = None;
    }

    /// Runs until shutdown or a fatal camera read failure, then returns
    /// itself so the service can reclaim the camera and collaborators.
    pub fn run(mut self) -> Self {
        let fps = self.config.capture_fps.max(1);
        let interval = Duration::from_secs_f64(1.0 / fps as f64);
        let mut last_tick: Option<Instant> = None;

        while self.flags.is_running() {
            if let Some(t) = last_tick {
                if t.elapsed() < interval {
                    thread::sleep(Duration::from_millis(1));
                    continue;
                }
            }
            let frame = {
                let Some(camera) = self.camera.as_mut() else {
                    log::error!("capture loop started without a camera");
                    break;
                };
                match camera.read() {
                    Ok(frame) => frame,
                    Err(e) => {
                        // Fail-stop: a broken camera is not retried.
                        log::error!("camera read failed, stopping capture: {e}");
                        let _ = self
                            .events
                            .send(ServiceEvent::CaptureStopped(e.to_string()));
                        break;
                    }
                }
            };
            last_tick = Some(Instant::now());
            self.tick(frame);
        }

        self.stop_tracking();
        self
    }

    /// One capture tick over an already-read frame.
    pub(crate) fn tick(&mut self, mut frame: Frame) {
        self.tick_count += 1;

        if self.flags.take_tracker_release() {
            self.stop_tracking();
        }

        let mut boxes: Vec<OverlayBox> = Vec::new();
        self.state = match std::mem::replace(&mut self.state, TrackState::Absent) {
            TrackState::Tracking(tracker) => self.advance_tracker(tracker, &frame, &mut boxes),
            TrackState::Absent => self.detect_and_start(&frame, &mut boxes),
        };

        if let Some(sink) = self.overlay.as_mut() {
            if let Err(e) = sink.publish(&mut frame, &boxes) {
                log::warn!("overlay sink failed: {e}");
                let _ = self.events.send(ServiceEvent::OverlayFailed(e.to_string()));
            }
        }

        if let Ok(mut cached) = self.last_frame.lock() {
            *cached = Some(frame);
        }
    }

    fn advance_tracker(
        &mut self,
        mut tracker: Box<dyn ShortTermTracker>,
        frame: &Frame,
        boxes: &mut Vec<OverlayBox>,
    ) -> TrackState {
        match tracker.update(frame) {
            Some(raw) => {
                let bbox = raw.clip(frame.width(), frame.height());
                if !bbox.is_empty() {
                    self.observe_tracked_face(frame, bbox);
                    boxes.push(OverlayBox {
                        bbox,
                        label: None,
                        score: 0.0,
                    });
                }
                TrackState::Tracking(tracker)
            }
            None => {
                log::debug!("tracker lost its subject");
                self.pose_buffer.clear();
                self.flags.set_tracker_active(false);
                TrackState::Absent
            }
        }
    }

    fn observe_tracked_face(&mut self, frame: &Frame, bbox: BoundingBox) {
        if self.tick_count % self.config.pose_stride == 0 {
            let crop = frame.crop(bbox);
            if !crop.is_empty() {
                match self.pose_estimator.estimate(&crop) {
                    Ok(Some(angles)) => {
                        let area_ratio = bbox.area_ratio(frame.width(), frame.height());
                        self.pose_buffer.push(PoseSample {
                            quality: angles.frontality_score(),
                            neg_area_ratio: -area_ratio,
                            crop,
                            angles,
                        });
                    }
                    Ok(None) => {}
                    Err(e) => log::debug!("pose estimation failed: {e}"),
                }
            }
        }
        self.maybe_submit_candidate();
    }

    fn maybe_submit_candidate(&mut self) {
        if self.flags.recognition_in_progress()
            || self.flags.result_displayed()
            || !self.requests.is_empty()
            || self.pose_buffer.len() < self.config.min_pose_samples
        {
            return;
        }
        let qualifies = self.pose_buffer.best().is_some_and(|best| {
            best.quality < self.config.frontality_threshold
                && best.area_ratio() >= self.config.min_face_area_ratio
        });
        if !qualifies {
            return;
        }
        if let Some(winner) = self.pose_buffer.take_best() {
            if self.requests.submit(winner.crop) {
                self.flags.set_recognition_in_progress(true);
            }
            // Stale observations must not feed the next candidate round.
            self.pose_buffer.clear();
        }
    }

    fn detect_and_start(&mut self, frame: &Frame, boxes: &mut Vec<OverlayBox>) -> TrackState {
        let scale = self.config.detect_scale;
        let small = frame.scaled(scale);
        let detections = match self.locator.detect(&small) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("face detection failed: {e}");
                return TrackState::Absent;
            }
        };
        let Some(best) = face_locator::largest(&detections) else {
            return TrackState::Absent;
        };
        let bbox = best
            .bbox
            .scaled(1.0 / scale)
            .clip(frame.width(), frame.height());
        if bbox.area_ratio(frame.width(), frame.height()) < self.config.min_face_area_ratio {
            return TrackState::Absent;
        }

        match self.tracker_factory.start(frame, bbox) {
            Ok(tracker) => {
                self.pose_buffer.clear();
                self.flags.set_tracker_active(true);
                boxes.push(OverlayBox {
                    bbox,
                    label: None,
                    score: best.score,
                });
                TrackState::Tracking(tracker)
            }
            Err(e) => {
                log::warn!("failed to start tracker: {e}");
                TrackState::Absent
            }
        }
    }

    fn stop_tracking(&mut self) {
        self.state = TrackState::Absent;
        self.pose_buffer.clear();
        self.flags.set_tracker_active(false);
    }

    #[cfg(test)]
    fn is_tracking(&self) -> bool {
        matches!(self.state, TrackState::Tracking(_))
    }

    #[cfg(test)]
    fn pose_sample_count(&self) -> usize {
        self.pose_buffer.len()
    }
}
