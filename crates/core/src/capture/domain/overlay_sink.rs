use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// One annotation published with a frame.
#[derive(Clone, Debug)]
pub struct OverlayBox {
    pub bbox: BoundingBox,
    pub label: Option<String>,
    pub score: f64,
}

/// Rendering boundary invoked once per processed frame.
///
/// Runs synchronously inside the capture loop and may draw into the frame
/// in place, so it must not block significantly. Errors are surfaced on the
/// service event channel but never stall the loop.
pub trait OverlaySink: Send {
    fn publish(
        &mut self,
        frame: &mut Frame,
        boxes: &[OverlayBox],
    ) -> Result<(), Box<dyn std::error::Error>>;
}
