pub mod events;
pub mod recognition_worker;
pub mod scheduler;
pub mod service;
pub mod status_flags;
