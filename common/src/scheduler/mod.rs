// Scheduler module for the mission scheduling use-cases

pub mod service;

pub use service::{MissionScheduler, MissionSchedulerService};
