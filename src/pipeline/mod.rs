//! Pipeline entry points for the monitor.
//!
//! - `detect_new_offers`: diff the listing against the known set
//! - `Monitor::run_cycle`: one fetch → notify → persist pass
//! - `Scheduler`: fixed-delay loop around the monitor

pub mod cycle;
pub mod diff;
pub mod scheduler;

pub use cycle::{CycleReport, Monitor, Recipients};
pub use diff::{ChangeSet, detect_new_offers};
pub use scheduler::{Scheduler, SchedulerState};
