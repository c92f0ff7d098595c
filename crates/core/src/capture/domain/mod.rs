pub mod camera_source;
pub mod candidate_selector;
pub mod face_locator;
pub mod overlay_sink;
pub mod pose_estimator;
pub mod short_term_tracker;
