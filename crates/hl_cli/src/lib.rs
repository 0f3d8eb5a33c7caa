pub mod config;
pub mod logging;
pub mod scheduler;
pub mod telemetry;

pub use config::{HumanDuration, Settings};
pub use scheduler::{Firing, Scheduler, SchedulerStats};
