// A learned, reusable rewrite.

use std::fmt;

use tracing::debug;

use crate::ast::NodeRef;
use crate::repair::{CandidateSource, Patch, PatternNode, RepairResult, Update};

/// Maps an input tree to a lazy, possibly empty sequence of rewritten trees.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneralizedTransformation {
    patch: Patch,
    score: f64,
    description: String,
}

impl GeneralizedTransformation {
    pub fn new(patch: Patch, score: f64, description: impl Into<String>) -> Self {
        Self {
            patch,
            score,
            description: description.into(),
        }
    }

    pub fn name(&self) -> &str {
        self.patch.name()
    }

    pub fn pattern(&self) -> &PatternNode {
        self.patch.matcher().pattern()
    }

    pub fn update(&self) -> &Update {
        self.patch.update()
    }

    /// Ranking score in `(0, 1]`; higher is more likely.
    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Rewritten trees, one per location where the learned shape occurs.
    /// Locations the rewrite does not fit are skipped, so a tree without the
    /// shape yields nothing.
    pub fn invoke<'a>(&'a self, input: &'a NodeRef) -> impl Iterator<Item = NodeRef> + 'a {
        self.patch.candidates(input).filter_map(move |candidate| match candidate {
            Ok(tree) => Some(tree),
            Err(e) => {
                debug!(transformation = self.name(), error = %e, "skipping location");
                None
            }
        })
    }

    pub fn as_patch(&self) -> &Patch {
        &self.patch
    }

    pub fn into_patch(self) -> Patch {
        self.patch
    }
}

impl CandidateSource for GeneralizedTransformation {
    fn name(&self) -> &str {
        GeneralizedTransformation::name(self)
    }

    fn candidates<'a>(&'a self, tree: &'a NodeRef) -> Box<dyn Iterator<Item = RepairResult<NodeRef>> + 'a> {
        Box::new(self.invoke(tree).map(Ok))
    }
}

impl fmt::Display for GeneralizedTransformation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{:.3}] {}", self.name(), self.score, self.description)
    }
}
