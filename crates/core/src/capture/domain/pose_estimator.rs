use crate::shared::frame::Frame;

const PITCH_WEIGHT: f32 = 0.8;
const ROLL_WEIGHT: f32 = 0.3;

/// Head orientation in degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoseAngles {
    pub yaw: f32,
    pub pitch: f32,
    pub roll: f32,
}

impl PoseAngles {
    /// Weighted deviation from a frontal pose; 0 is perfectly frontal,
    /// lower is better. Yaw dominates, roll matters least.
    pub fn frontality_score(&self) -> f32 {
        self.yaw.abs() + PITCH_WEIGHT * self.pitch.abs() + ROLL_WEIGHT * self.roll.abs()
    }
}

/// Domain interface for head-pose estimation on a face crop.
///
/// `Ok(None)` means the estimator could not produce angles for this crop
/// (e.g. landmarks not found); that is expected and not an error.
pub trait PoseEstimator: Send {
    fn estimate(&mut self, crop: &Frame) -> Result<Option<PoseAngles>, Box<dyn std::error::Error>>;
}
