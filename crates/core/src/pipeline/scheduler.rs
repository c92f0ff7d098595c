use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::shared::frame::Frame;

/// The single-slot hand-off between the capture loop and the worker.
///
/// Capacity is exactly 1: a producer either claims the empty slot or drops
/// its candidate; it never blocks the capture path. The consumer side is the
/// plain receiver, waited on with a timeout so shutdown is observed promptly.
pub struct RecognitionScheduler {
    tx: Sender<Frame>,
    rx: Receiver<Frame>,
}

impl RecognitionScheduler {
    pub fn new() -> Self {
        let (tx, rx) = bounded(1);
        Self { tx, rx }
    }

    pub fn submit_handle(&self) -> SubmitHandle {
        SubmitHandle {
            tx: self.tx.clone(),
        }
    }

    pub fn receiver(&self) -> Receiver<Frame> {
        self.rx.clone()
    }

    /// Discards any stale request, e.g. before (re)starting the loops.
    pub fn drain(&self) {
        while self.rx.try_recv().is_ok() {}
    }
}

impl Default for RecognitionScheduler {
    fn default() -> Self {
        Self::new()
    }
}

/// Producer side of the slot, held by the capture loop.
#[derive(Clone)]
pub struct SubmitHandle {
    tx: Sender<Frame>,
}

impl SubmitHandle {
    /// Non-blocking enqueue; `false` means the slot was occupied (or the
    /// consumer is gone) and the crop was dropped.
    pub fn submit(&self, crop: Frame) -> bool {
        match self.tx.try_send(crop) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) | Err(TrySendError::Disconnected(_)) => false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }
}

/// Blocking wait used by the worker; `None` on timeout or disconnect.
pub fn recv_request(rx: &Receiver<Frame>, timeout: Duration) -> Option<Frame> {
    rx.recv_timeout(timeout).ok()
}
