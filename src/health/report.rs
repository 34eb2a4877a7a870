// src/health/report.rs
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

const SUCCESS_MARKER: &str = "✅";
const FAILURE_MARKER: &str = "❌";

/// Dependencies probed by the health check, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dependency {
    Database,
    Redis,
    Cache,
    Queue,
}

impl Dependency {
    pub const ALL: [Dependency; 4] = [
        Dependency::Database,
        Dependency::Redis,
        Dependency::Cache,
        Dependency::Queue,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Dependency::Database => "database",
            Dependency::Redis => "redis",
            Dependency::Cache => "cache",
            Dependency::Queue => "queue",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyCheck {
    pub name: Dependency,
    pub status: String,
    pub healthy: bool,
}

impl DependencyCheck {
    pub fn up(name: Dependency, detail: impl fmt::Display) -> Self {
        Self {
            name,
            status: format!("{SUCCESS_MARKER} {detail}"),
            healthy: true,
        }
    }

    pub fn down(name: Dependency, message: impl fmt::Display) -> Self {
        Self {
            name,
            status: format!("{FAILURE_MARKER} {message}"),
            healthy: false,
        }
    }
}

/// Ordered name -> status mapping. Serializes as a JSON object whose keys
/// follow check order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HealthReport {
    checks: Vec<DependencyCheck>,
}

impl HealthReport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records a check, replacing any earlier entry for the same dependency.
    pub(crate) fn record(&mut self, check: DependencyCheck) {
        match self.checks.iter_mut().find(|c| c.name == check.name) {
            Some(existing) => *existing = check,
            None => self.checks.push(check),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.checks.len()
    }
}

impl Serialize for HealthReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.checks.len()))?;
        for check in &self.checks {
            map.serialize_entry(check.name.as_str(), &check.status)?;
        }
        map.end()
    }
}
