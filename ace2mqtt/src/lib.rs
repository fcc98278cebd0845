// externally visible interfaces
pub mod ace;
pub mod clock;
pub mod error;
pub mod firmware;
pub mod home_assistant;
pub mod mqtt_config;
pub mod mqtt_wrapper;
pub mod rolling_window;
pub mod router;
pub mod scheduler;
pub mod signal_monitor;
pub mod topic;

// internal interfaces
mod template;
