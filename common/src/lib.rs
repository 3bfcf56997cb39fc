// Common library for the UMAS mission scheduler

pub mod bootstrap;
pub mod clock;
pub mod config;
pub mod db;
pub mod enricher;
pub mod errors;
pub mod jobs;
pub mod lock;
pub mod models;
pub mod queue;
pub mod retry;
pub mod schedule;
pub mod scheduler;
pub mod telemetry;
pub mod window;
