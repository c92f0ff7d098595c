use crate::recognition::recognizer::RecognitionResult;

/// Out-of-band notifications from the processing loops.
///
/// Failures that must not stall either loop (overlay rendering, a failed
/// recognition attempt) are reported here instead of being swallowed, so
/// the embedding application can react or log as it sees fit.
#[derive(Clone, Debug)]
pub enum ServiceEvent {
    /// A recognition attempt completed; carries the (possibly Unknown) result.
    Recognized(RecognitionResult),
    /// The recognition path failed; the pipeline keeps running.
    RecognitionFailed(String),
    /// The overlay sink returned an error; the frame was still processed.
    OverlayFailed(String),
    /// The capture loop terminated because a camera read failed.
    CaptureStopped(String),
}
