use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// Frame-to-frame box estimation without full detection.
///
/// `update` returns the new box estimate, or `None` once the subject is
/// lost; after reporting loss a tracker is discarded, never reused.
pub trait ShortTermTracker: Send {
    fn update(&mut self, frame: &Frame) -> Option<BoundingBox>;
}

/// Creates a tracker primed with the initial box on the given frame.
pub trait TrackerFactory: Send {
    fn start(
        &self,
        frame: &Frame,
        bbox: BoundingBox,
    ) -> Result<Box<dyn ShortTermTracker>, Box<dyn std::error::Error>>;
}
