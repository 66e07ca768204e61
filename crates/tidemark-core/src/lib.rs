pub mod config;
pub mod error;
pub mod event;
pub mod filter;
pub mod funnel;
pub mod journey;
pub mod matcher;
pub mod memory;
pub mod runner;
pub mod store;
pub mod telemetry;
pub mod time_range;
