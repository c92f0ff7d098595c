use std::sync::atomic::{AtomicBool, Ordering};

/// Status flags shared between the capture and recognition loops.
///
/// All flags use Release stores and Acquire loads so that a reader observing
/// a flag transition also observes the writes that preceded it. The flags
/// approximate single-in-flight-recognition semantics together with the
/// capacity-1 request channel; they are a gate, not a hard mutex.
#[derive(Debug, Default)]
pub struct StatusFlags {
    running: AtomicBool,
    recognition_in_progress: AtomicBool,
    result_displayed: AtomicBool,
    lockout_active: AtomicBool,
    tracker_active: AtomicBool,
    /// Set by the worker when a result completes; consumed by the capture
    /// loop, which stops its tracker on the next tick.
    tracker_release: AtomicBool,
}

impl StatusFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn set_running(&self, value: bool) {
        self.running.store(value, Ordering::Release);
    }

    pub fn recognition_in_progress(&self) -> bool {
        self.recognition_in_progress.load(Ordering::Acquire)
    }

    pub fn set_recognition_in_progress(&self, value: bool) {
        self.recognition_in_progress.store(value, Ordering::Release);
    }

    pub fn result_displayed(&self) -> bool {
        self.result_displayed.load(Ordering::Acquire)
    }

    pub fn set_result_displayed(&self, value: bool) {
        self.result_displayed.store(value, Ordering::Release);
    }

    pub fn lockout_active(&self) -> bool {
        self.lockout_active.load(Ordering::Acquire)
    }

    pub fn set_lockout_active(&self, value: bool) {
        self.lockout_active.store(value, Ordering::Release);
    }

    pub fn tracker_active(&self) -> bool {
        self.tracker_active.load(Ordering::Acquire)
    }

    pub fn set_tracker_active(&self, value: bool) {
        self.tracker_active.store(value, Ordering::Release);
    }

    pub fn request_tracker_release(&self) {
        self.tracker_release.store(true, Ordering::Release);
    }

    /// Returns whether a release was requested, clearing the request.
    pub fn take_tracker_release(&self) -> bool {
        self.tracker_release.swap(false, Ordering::AcqRel)
    }

    /// Resets everything except `running` to the idle state.
    pub fn reset_pipeline_state(&self) {
        self.set_recognition_in_progress(false);
        self.set_result_displayed(false);
        self.set_lockout_active(false);
        self.set_tracker_active(false);
        self.take_tracker_release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_start_cleared() {
        let flags = StatusFlags::new();
        assert!(!flags.is_running());
        assert!(!flags.recognition_in_progress());
        assert!(!flags.result_displayed());
        assert!(!flags.lockout_active());
        assert!(!flags.tracker_active());
    }

    #[test]
    fn test_tracker_release_is_consumed_once() {
        let flags = StatusFlags::new();
        flags.request_tracker_release();
        assert!(flags.take_tracker_release());
        assert!(!flags.take_tracker_release());
    }

    #[test]
    fn test_reset_pipeline_state_keeps_running() {
        let flags = StatusFlags::new();
        flags.set_running(true);
        flags.set_recognition_in_progress(true);
        flags.set_result_displayed(true);
        flags.set_lockout_active(true);
        flags.set_tracker_active(true);
        flags.request_tracker_release();

        flags.reset_pipeline_state();

        assert!(flags.is_running());
        assert!(!flags.recognition_in_progress());
        assert!(!flags.result_displayed());
        assert!(!flags.lockout_active());
        assert!(!flags.tracker_active());
        assert!(!flags.take_tracker_release());
    }
}
