use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender};

use crate::pipeline::events::ServiceEvent;
use crate::pipeline::scheduler;
use crate::pipeline::status_flags::StatusFlags;
use crate::recognition::recognizer::{RecognitionResult, Recognizer};
use crate::shared::constants::REQUEST_WAIT_TIMEOUT;
use crate::shared::frame::Frame;

/// Granularity of the lockout sleep; bounds how long `stop` can be held up
/// by an in-flight lockout.
const LOCKOUT_STEP: Duration = Duration::from_millis(25);

/// Consumes candidate crops from the single-slot channel, runs recognition,
/// publishes the result and enforces the post-result lockout.
pub struct RecognitionWorker {
    requests: Receiver<Frame>,
    recognizer: Arc<Mutex<Recognizer>>,
    flags: Arc<StatusFlags>,
    last_result: Arc<Mutex<Option<RecognitionResult>>>,
    events: Sender<ServiceEvent>,
    lockout: Duration,
}

impl RecognitionWorker {
    pub fn new(
        requests: Receiver<Frame>,
        recognizer: Arc<Mutex<Recognizer>>,
        flags: Arc<StatusFlags>,
        last_result: Arc<Mutex<Option<RecognitionResult>>>,
        events: Sender<ServiceEvent>,
        lockout: Duration,
    ) -> Self {
        Self {
            requests,
            recognizer,
            flags,
            last_result,
            events,
            lockout,
        }
    }

    /// Runs until the shared running flag clears. Waits on the request slot
    /// with a short timeout so shutdown is observed between requests.
    pub fn run(mut self) {
        while self.flags.is_running() {
            let Some(crop) = scheduler::recv_request(&self.requests, REQUEST_WAIT_TIMEOUT) else {
                continue;
            };
            self.handle_request(crop);
        }
    }

    pub(crate) fn handle_request(&mut self, crop: Frame) {
        let outcome = match self.recognizer.lock() {
            Ok(mut recognizer) => recognizer.recognize(&crop),
            Err(_) => Err("recognizer lock poisoned".into()),
        };

        match outcome {
            Ok(result) => {
                log::info!(
                    "recognition result: {} (confidence {:.2})",
                    result.name,
                    result.confidence
                );
                if let Ok(mut slot) = self.last_result.lock() {
                    *slot = Some(result.clone());
                }
                // Order matters: the displayed flag must be up before the
                // in-progress gate opens, or the capture loop could submit
                // a new candidate in between.
                self.flags.set_result_displayed(true);
                self.flags.set_recognition_in_progress(false);
                self.flags.request_tracker_release();
                let _ = self.events.send(ServiceEvent::Recognized(result));

                self.lockout_pause();
                self.flags.set_result_displayed(false);
            }
            Err(e) => {
                log::warn!("recognition failed: {e}");
                let _ = self
                    .events
                    .send(ServiceEvent::RecognitionFailed(e.to_string()));
                self.flags.set_recognition_in_progress(false);
            }
        }
    }

    /// Sleeps out the lockout in short steps, bailing early on shutdown.
    fn lockout_pause(&self) {
        self.flags.set_lockout_active(true);
        let deadline = Instant::now() + self.lockout;
        loop {
            let now = Instant::now();
            if now >= deadline || !self.flags.is_running() {
                break;
            }
            thread::sleep(LOCKOUT_STEP.min(deadline - now));
        }
        self.flags.set_lockout_active(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::domain::face_locator::{FaceDetection, FaceLocator};
    use crate::pipeline::scheduler::RecognitionScheduler;
    use crate::recognition::domain::face_encoder::FaceEncoder;
    use crate::recognition::identity_store::KnownIdentities;
    use crate::recognition::recognizer::IdentitySnapshot;
    use crate::shared::bounding_box::BoundingBox;
    use crate::shared::constants::DEFAULT_RECOGNITION_THRESHOLD;
    use crossbeam_channel::unbounded;
    use ndarray::{array, Array1};
    use std::sync::RwLock;

    struct WholeFrameLocator;

    impl FaceLocator for WholeFrameLocator {
        fn detect(
            &mut self,
            frame: &Frame,
        ) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>> {
            Ok(vec![FaceDetection {
                bbox: BoundingBox::new(0, 0, frame.width() as i32, frame.height() as i32),
                score: 0.9,
            }])
        }
    }

    struct FixedEncoder {
        embedding: Array1<f32>,
    }

    impl FaceEncoder for FixedEncoder {
        fn encode(
            &mut self,
            _: &Frame,
        ) -> Result<Option<Array1<f32>>, Box<dyn std::error::Error>> {
            Ok(Some(self.embedding.clone()))
        }
    }

    struct FailingEncoder;

    impl FaceEncoder for FailingEncoder {
        fn encode(
            &mut self,
            _: &Frame,
        ) -> Result<Option<Array1<f32>>, Box<dyn std::error::Error>> {
            Err("encoder backend unavailable".into())
        }
    }

    fn crop() -> Frame {
        Frame::new(vec![128u8; 200 * 200 * 3], 200, 200, 3)
    }

    fn alice_snapshot() -> Arc<RwLock<IdentitySnapshot>> {
        let identities =
            KnownIdentities::new(vec!["alice".to_string()], array![[1.0, 0.0]]).unwrap();
        Arc::new(RwLock::new(IdentitySnapshot::from_identities(&identities)))
    }

    fn worker_with(
        encoder: Box<dyn FaceEncoder>,
        lockout: Duration,
    ) -> (
        RecognitionWorker,
        Arc<StatusFlags>,
        Arc<Mutex<Option<RecognitionResult>>>,
        crossbeam_channel::Receiver<ServiceEvent>,
    ) {
        let recognizer = Arc::new(Mutex::new(Recognizer::new(
            Box::new(WholeFrameLocator),
            encoder,
            alice_snapshot(),
            DEFAULT_RECOGNITION_THRESHOLD,
        )));
        let scheduler = RecognitionScheduler::new();
        let flags = Arc::new(StatusFlags::new());
        flags.set_running(true);
        let last_result = Arc::new(Mutex::new(None));
        let (events_tx, events_rx) = unbounded();
        let worker = RecognitionWorker::new(
            scheduler.receiver(),
            recognizer,
            flags.clone(),
            last_result.clone(),
            events_tx,
            lockout,
        );
        (worker, flags, last_result, events_rx)
    }

    #[test]
    fn test_result_publishes_and_requests_release() {
        let (mut worker, flags, last_result, events) = worker_with(
            Box::new(FixedEncoder {
                embedding: array![1.0, 0.0],
            }),
            Duration::ZERO,
        );
        flags.set_recognition_in_progress(true);

        worker.handle_request(crop());

        assert!(!flags.recognition_in_progress());
        assert!(flags.take_tracker_release());
        let stored = last_result.lock().unwrap().clone().unwrap();
        assert_eq!(stored.name, "alice");
        let event = events.try_recv().unwrap();
        assert!(matches!(event, ServiceEvent::Recognized(r) if r.name == "alice"));
    }

    #[test]
    fn test_displayed_flag_cleared_after_lockout() {
        let (mut worker, flags, _, _) = worker_with(
            Box::new(FixedEncoder {
                embedding: array![1.0, 0.0],
            }),
            Duration::from_millis(10),
        );
        worker.handle_request(crop());
        assert!(!flags.result_displayed());
        assert!(!flags.lockout_active());
    }

    #[test]
    fn test_flags_held_during_lockout_window() {
        let (mut worker, flags, _, _) = worker_with(
            Box::new(FixedEncoder {
                embedding: array![1.0, 0.0],
            }),
            Duration::from_millis(300),
        );
        let observed = flags.clone();
        let handle = thread::spawn(move || worker.handle_request(crop()));

        // Wait for the lockout to begin, well inside the 300 ms window.
        let deadline = Instant::now() + Duration::from_secs(5);
        while !observed.lockout_active() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(2));
        }
        assert!(observed.lockout_active());
        assert!(observed.result_displayed());

        handle.join().unwrap();
        assert!(!observed.lockout_active());
        assert!(!observed.result_displayed());
    }

    #[test]
    fn test_failure_clears_in_progress_and_reports() {
        let (mut worker, flags, last_result, events) =
            worker_with(Box::new(FailingEncoder), Duration::ZERO);
        flags.set_recognition_in_progress(true);

        worker.handle_request(crop());

        assert!(!flags.recognition_in_progress());
        assert!(last_result.lock().unwrap().is_none());
        let event = events.try_recv().unwrap();
        assert!(matches!(event, ServiceEvent::RecognitionFailed(_)));
        // No release requested on failure; the tracker keeps its subject.
        assert!(!flags.take_tracker_release());
    }

    #[test]
    fn test_lockout_interrupted_by_shutdown() {
        let (mut worker, flags, _, _) = worker_with(
            Box::new(FixedEncoder {
                embedding: array![1.0, 0.0],
            }),
            Duration::from_secs(30),
        );
        flags.set_running(false);
        let started = Instant::now();
        worker.handle_request(crop());
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(!flags.lockout_active());
    }

    #[test]
    fn test_worker_run_exits_on_shutdown() {
        let (worker, flags, _, _) = worker_with(
            Box::new(FixedEncoder {
                embedding: array![1.0, 0.0],
            }),
            Duration::ZERO,
        );
        let handle = thread::spawn(move || worker.run());
        thread::sleep(Duration::from_millis(30));
        flags.set_running(false);
        handle.join().unwrap();
    }
}
