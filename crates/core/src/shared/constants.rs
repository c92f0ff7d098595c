use std::time::Duration;

/// Euclidean distance below which a nearest-neighbor match counts as known.
pub const DEFAULT_RECOGNITION_THRESHOLD: f32 = 0.55;

/// Frontality score ceiling for a pose sample to qualify for recognition.
pub const DEFAULT_FRONTALITY_THRESHOLD: f32 = 35.0;

/// Minimum face-box area relative to the frame, both for starting a tracker
/// and for submitting a candidate crop.
pub const DEFAULT_MIN_FACE_AREA_RATIO: f32 = 0.05;

/// Pose estimation runs every Nth capture tick while tracking.
pub const DEFAULT_POSE_STRIDE: u64 = 2;

/// Bounded FIFO capacity for pose samples; oldest evicted on overflow.
pub const POSE_BUFFER_CAPACITY: usize = 12;

/// Candidate selection needs at least this many buffered samples.
pub const MIN_POSE_SAMPLES: usize = 3;

pub const DEFAULT_CAPTURE_FPS: u32 = 15;
pub const DEFAULT_DISPLAY_FPS: u32 = 15;

/// Detection runs on a copy of the frame downscaled by this factor.
pub const DEFAULT_DETECT_SCALE: f64 = 0.5;

/// Crops with a larger side below this are upscaled before re-detection
/// and encoding.
pub const MIN_RECOGNITION_CROP_SIDE: u32 = 180;

/// Cool-down after a recognition result during which the displayed-result
/// flag stays set and no new candidate is submitted.
pub const DEFAULT_LOCKOUT: Duration = Duration::from_secs(1);

/// The recognition worker wakes at least this often to observe shutdown.
pub const REQUEST_WAIT_TIMEOUT: Duration = Duration::from_millis(100);

/// Alternate camera indices scanned when the requested one fails to open.
pub const CAMERA_FALLBACK_INDICES: std::ops::Range<u32> = 1..5;

pub const DEFAULT_CAMERA_WIDTH: u32 = 640;
pub const DEFAULT_CAMERA_HEIGHT: u32 = 480;

/// Row count at which the embedding index switches from a brute-force scan
/// to a k-d tree.
pub const KD_TREE_MIN_ROWS: usize = 32;
