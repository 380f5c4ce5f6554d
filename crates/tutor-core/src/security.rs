//! Resource limits for running untrusted candidate programs
//!
//! Every candidate the fixer produces is, by construction, a variant of a
//! buggy program. Runs are bounded by:
//! - a wall-clock deadline, checked cooperatively and backed by a worker timeout
//! - a step budget and a call-depth limit inside the interpreter
//! - caps on how many candidates a single search may generate

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits applied to a single program execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionLimits {
    /// Wall-clock budget per execution in milliseconds
    pub timeout_ms: u64,
    /// Maximum number of statements and expressions evaluated
    pub max_steps: u64,
    /// Maximum depth of nested function calls
    pub max_depth: usize,
    /// Stack size of the execution worker thread
    pub stack_size_bytes: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            timeout_ms: 2_000,
            max_steps: 5_000_000,
            max_depth: 400,
            stack_size_bytes: 64 * 1024 * 1024, // 64MB
        }
    }
}

impl ExecutionLimits {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Bounds on the candidate search of a single fix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchLimits {
    /// Total candidate programs tried across all patches
    pub max_candidates: usize,
    /// Match locations considered for any one patch
    pub max_locations_per_patch: usize,
}

impl Default for SearchLimits {
    fn default() -> Self {
        Self {
            max_candidates: 10_000,
            max_locations_per_patch: 1_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_limits_fill_defaults() {
        let limits: ExecutionLimits = serde_json::from_str(r#"{"timeout_ms": 50}"#).unwrap();
        assert_eq!(limits.timeout(), Duration::from_millis(50));
        assert_eq!(limits.max_steps, ExecutionLimits::default().max_steps);
    }

    #[test]
    fn test_builders() {
        let limits = ExecutionLimits::default()
            .with_timeout_ms(10)
            .with_max_steps(100)
            .with_max_depth(5);
        assert_eq!((limits.timeout_ms, limits.max_steps, limits.max_depth), (10, 100, 5));
    }
}
