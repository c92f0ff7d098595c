use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// One detected face with its detector confidence.
#[derive(Clone, Copy, Debug)]
pub struct FaceDetection {
    pub bbox: BoundingBox,
    pub score: f64,
}

/// Domain interface for face detection.
///
/// Implementations may be stateful, hence `&mut self`. Boxes are reported in
/// the coordinates of the frame given; callers rescale when detecting on a
/// downscaled copy.
pub trait FaceLocator: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>>;
}

/// The detection with the largest box area, if any.
pub fn largest(detections: &[FaceDetection]) -> Option<&FaceDetection> {
    detections.iter().max_by_key(|d| d.bbox.area())
}
