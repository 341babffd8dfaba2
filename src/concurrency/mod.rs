pub mod deadlock_detector;
pub mod lock_manager;
pub mod lock_mode;

pub use deadlock_detector::DeadlockDetector;
pub use lock_manager::{LockManager, ResourceQueueHandle};
pub use lock_mode::LockMode;
