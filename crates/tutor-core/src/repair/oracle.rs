/*!
# Test Oracle

Ordered mapping from an input expression, evaluated after the candidate
program, to the value it must produce. Values are compared structurally, so
`6` and `6.0` agree and a list matches a tuple with the same elements.
*/

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::evaluator::{Executor, Value};
use crate::security::ExecutionLimits;

/// One `(input, expected)` pair as stored in oracle files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TestOracle {
    cases: IndexMap<String, Value>,
}

/// Outcome of running a program against an oracle.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Pass,
    Fail { input: String, failure: Failure },
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Failure {
    Mismatch { expected: Value, actual: Value },
    Error(String),
    Timeout,
}

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Failure::Mismatch { expected, actual } => write!(f, "expected {expected}, got {actual}"),
            Failure::Error(message) => write!(f, "{message}"),
            Failure::Timeout => write!(f, "timed out"),
        }
    }
}

impl TestOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case(mut self, input: impl Into<String>, expected: impl Into<Value>) -> Self {
        self.insert(input, expected);
        self
    }

    /// Add a case; an input already present keeps its position.
    pub fn insert(&mut self, input: impl Into<String>, expected: impl Into<Value>) {
        self.cases.insert(input.into(), expected.into());
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.cases.iter().map(|(input, expected)| (input.as_str(), expected))
    }

    pub fn from_cases(cases: impl IntoIterator<Item = TestCase>) -> Self {
        let mut oracle = Self::new();
        for case in cases {
            oracle.insert(case.input, case.expected);
        }
        oracle
    }

    /// Parse a JSON list of `{"input": ..., "expected": ...}` objects.
    pub fn from_json(json: &str) -> Result<Self> {
        let cases: Vec<TestCase> = serde_json::from_str(json).context("Failed to parse test cases")?;
        Ok(Self::from_cases(cases))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).with_context(|| format!("Failed to read tests from {path:?}"))?;
        Self::from_json(&json).with_context(|| format!("Failed to load tests from {path:?}"))
    }

    /// Run `program` followed by each input, stopping at the first failure.
    pub fn check(&self, executor: &dyn Executor, program: &str, limits: &ExecutionLimits) -> Verdict {
        for (input, expected) in self.iter() {
            let source = format!("{program}\n{input}");
            let failure = match executor.execute(&source, limits) {
                Ok(actual) if actual.equivalent(expected) => continue,
                Ok(actual) => Failure::Mismatch {
                    expected: expected.clone(),
                    actual,
                },
                Err(e) if e.is_timeout() => Failure::Timeout,
                Err(e) => Failure::Error(e.to_string()),
            };
            trace!(input, %failure, "test failed");
            return Verdict::Fail {
                input: input.to_string(),
                failure,
            };
        }
        Verdict::Pass
    }
}

impl<'a> IntoIterator for &'a TestOracle {
    type Item = (&'a String, &'a Value);
    type IntoIter = indexmap::map::Iter<'a, String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.cases.iter()
    }
}
