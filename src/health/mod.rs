// src/health/mod.rs
mod aggregator;
mod probe;
mod report;

pub use aggregator::{describe_queue, HealthAggregator, HealthSettings};
pub use probe::{CacheStore, DatabaseProbe, KeyValueProbe, ProbeError};
pub use report::{Dependency, HealthReport};
