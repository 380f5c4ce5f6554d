/*!
# Repair - Structural Matching, Rewriting and Patch Validation

Finds locations in a parsed program that match a pattern, rewrites one location
at a time without touching the original tree, and validates every rewritten
candidate against a test oracle.

## Overview

1. **Matcher**: pre-order search for every location where a `PatternNode`
   structurally matches, binding slots to the nodes they captured
2. **Update**: rebuilds the root-to-node spine with a replacement (or with the
   node removed from its sequence), sharing every other subtree
3. **SubmissionFixer**: parses a submission once, then tries every (patch,
   location) candidate against the oracle until one passes every test
4. **BatchFixer**: runs the fixer over a directory of submissions

## Architecture

- `PatternNode`: closed enum of exact and wildcard template nodes
- `Matcher` / `MatchResult`: lazy per-location matches and their collected bindings
- `Update` / `Patch`: how to rewrite a bound node, and what to find first
- `TestOracle`: ordered input expression to expected value mapping
- `SubmissionFixer` / `BatchFixer`: the validation loop, single file or directory

## Example Usage

```rust,ignore
use tutor_core::repair::{Patch, PatternNode, SubmissionFixer, TestOracle, Update};

let patch = Patch::new(
    "reset accumulator",
    PatternNode::parse("total, k = $1{0}, 1")?,
    Update::parse_replacement("1")?,
)?;
let tests = TestOracle::new().with_case("product(3, identity)", 6);

let mut fixer = SubmissionFixer::new();
if let Some(outcome) = fixer.fix(source, &[patch], &tests)? {
    println!("{}", outcome.source);
}
```
*/

pub mod batch;
pub mod fixer;
pub mod matcher;
pub mod oracle;
pub mod patch;
pub mod pattern;
pub mod update;

// Re-export main types
pub use batch::{BatchFixer, BatchSummary};
pub use fixer::{CandidateSource, FixOutcome, SubmissionFixer};
pub use matcher::{Match, MatchResult, Matcher};
pub use oracle::{Failure, TestCase, TestOracle, Verdict};
pub use patch::{load_patches, parse_patches, Patch, PatchSpec, PatchStats, UpdateSpec};
pub use pattern::PatternNode;
pub use update::Update;

use thiserror::Error;

use crate::parser::ParseError;

/// Slot rewritten by a patch unless it names another one.
pub const DEFAULT_SLOT: crate::ast::SlotId = 1;

/// Conditions that abort a repair instead of being absorbed by the search.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RepairError {
    /// The patch itself is malformed: a bug in whoever built it.
    #[error("invalid patch: {0}")]
    InvalidPatch(String),

    /// A pattern or replacement source could not be parsed.
    #[error("invalid pattern {source_text:?}: {message}")]
    InvalidPattern { source_text: String, message: String },

    /// The submission could not be parsed, so no patch was attempted.
    #[error("submission does not parse: {0}")]
    FatalParse(#[from] ParseError),
}

impl RepairError {
    pub fn invalid_patch(message: impl Into<String>) -> Self {
        RepairError::InvalidPatch(message.into())
    }

    pub fn invalid_pattern(source_text: &str, message: impl Into<String>) -> Self {
        RepairError::InvalidPattern {
            source_text: source_text.to_string(),
            message: message.into(),
        }
    }
}

// Common result type for repairs
pub type RepairResult<T> = Result<T, RepairError>;
