//! # Tutor Core
//!
//! Example-driven repair of small programs, including:
//! - A uniform, persistent tree for a Python subset, with parser and unparser
//! - A structural pattern matcher with slot bindings
//! - A tree-rewrite engine that shares every untouched subtree
//! - A learner that generalizes one before/after example into transformations
//! - A patch validator that runs candidates against a test oracle under limits
//!
//! The CLI in `tutor-cli` is a thin layer over these components.

#![warn(clippy::all)]

pub mod ast;
pub mod evaluator;
pub mod parser;
pub mod repair;
pub mod security;
pub mod synthesis;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use ast::{Node, NodeKind, NodeRef, ToSource};
pub use evaluator::{Executor, Interpreter, Value};
pub use parser::{create_parser, ParseError, Parser, PythonParser};
pub use repair::{
    BatchFixer, BatchSummary, FixOutcome, MatchResult, Matcher, Patch, PatternNode, RepairError, SubmissionFixer,
    TestOracle, Update,
};
pub use security::{ExecutionLimits, SearchLimits};
pub use synthesis::{EditGrammar, ExampleLearner, GeneralizedTransformation, GrammarError, SynthesisEngine};

/// Tutor version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for tutor components
pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Initialize tracing with `level` as the default for `tutor_core`;
/// `RUST_LOG` still wins when set
pub fn init_tracing_with_level(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("tutor_core={level},tutor_cli={level},tutor={level}")));
    // A subscriber may already be installed (tests, embedding); keep it.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Core tutor configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TutorConfig {
    /// Limits applied to every candidate execution
    pub execution: ExecutionLimits,
    /// Bounds on a single fix search
    pub search: SearchLimits,
    /// Edit grammar for the learner; the built-in grammar when unset
    pub grammar_path: Option<PathBuf>,
    /// Enable debug logging
    pub debug: bool,
}

impl TutorConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TutorError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .map_err(|e| TutorError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json(&json)
    }

    /// The configured edit grammar. A grammar file that fails to load is fatal.
    pub fn grammar(&self) -> Result<EditGrammar> {
        match &self.grammar_path {
            Some(path) => Ok(EditGrammar::load(path)?),
            None => Ok(EditGrammar::default()),
        }
    }
}

/// Error types for tutor core operations
#[derive(thiserror::Error, Debug)]
pub enum TutorError {
    /// Repair error: invalid patch or unparsable submission
    #[error(transparent)]
    Repair(#[from] RepairError),

    /// Edit grammar error
    #[error(transparent)]
    Grammar(#[from] GrammarError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for tutor core operations
pub type Result<T> = std::result::Result<T, TutorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_overrides() {
        let config = TutorConfig::from_json(r#"{"execution": {"timeout_ms": 100}, "debug": true}"#).unwrap();
        assert_eq!(config.execution.timeout_ms, 100);
        assert_eq!(config.execution.max_depth, ExecutionLimits::default().max_depth);
        assert_eq!(config.search, SearchLimits::default());
        assert!(config.debug);
        assert_eq!(config.grammar().unwrap(), EditGrammar::default());
    }

    #[test]
    fn test_config_errors() {
        assert!(matches!(TutorConfig::from_json("{"), Err(TutorError::Config(_))));
        let config = TutorConfig {
            grammar_path: Some(PathBuf::from("/nonexistent/edits.grammar")),
            ..TutorConfig::default()
        };
        assert!(matches!(config.grammar(), Err(TutorError::Grammar(_))));
    }
}
