/*!
# SubmissionFixer - Patch Validation

Parses a submission once, then walks every candidate the patches produce (patch
order first, then traversal order) and runs it against the test oracle. The
first candidate that passes every test is the fix.

Only a submission that does not parse, or a malformed patch, stops the search.
Test mismatches, runtime faults and timeouts reject one candidate and the
search moves on.
*/

use std::time::Instant;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use super::oracle::{Failure, TestOracle, Verdict};
use super::patch::{Patch, PatchStats};
use super::{RepairError, RepairResult};
use crate::ast::{NodeRef, ToSource};
use crate::evaluator::{Executor, Interpreter};
use crate::parser::{Parser, PythonParser};
use crate::security::{ExecutionLimits, SearchLimits};
use crate::synthesis::GeneralizedTransformation;
use crate::TutorConfig;

/// Anything that turns a parsed submission into candidate rewrites.
pub trait CandidateSource {
    /// Name used in statistics and logs
    fn name(&self) -> &str;

    /// Candidate trees, lazily, in the order they should be tried
    fn candidates<'a>(&'a self, tree: &'a NodeRef) -> Box<dyn Iterator<Item = RepairResult<NodeRef>> + 'a>;
}

impl CandidateSource for Patch {
    fn name(&self) -> &str {
        Patch::name(self)
    }

    fn candidates<'a>(&'a self, tree: &'a NodeRef) -> Box<dyn Iterator<Item = RepairResult<NodeRef>> + 'a> {
        Box::new(Patch::candidates(self, tree))
    }
}

/// A candidate that passed every test.
#[derive(Debug, Clone)]
pub struct FixOutcome {
    /// Patch (or learned transformation) that produced the fix
    pub patch_name: String,
    /// Index of the match location among that patch's candidates
    pub location: usize,
    /// Candidates tried across all patches, this one included
    pub candidates_tried: usize,
    /// Repaired program text
    pub source: String,
    pub tree: NodeRef,
}

pub struct SubmissionFixer {
    parser: Box<dyn Parser>,
    executor: Box<dyn Executor>,
    limits: ExecutionLimits,
    search: SearchLimits,
    stats: IndexMap<String, PatchStats>,
}

impl Default for SubmissionFixer {
    fn default() -> Self {
        Self::new()
    }
}

impl SubmissionFixer {
    pub fn new() -> Self {
        Self {
            parser: Box::new(PythonParser::new()),
            executor: Box::new(Interpreter::new()),
            limits: ExecutionLimits::default(),
            search: SearchLimits::default(),
            stats: IndexMap::new(),
        }
    }

    pub fn from_config(config: &TutorConfig) -> Self {
        Self::new()
            .with_limits(config.execution.clone())
            .with_search_limits(config.search.clone())
    }

    pub fn with_parser(mut self, parser: Box<dyn Parser>) -> Self {
        self.parser = parser;
        self
    }

    pub fn with_executor(mut self, executor: Box<dyn Executor>) -> Self {
        self.executor = executor;
        self
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_search_limits(mut self, search: SearchLimits) -> Self {
        self.search = search;
        self
    }

    pub fn limits(&self) -> &ExecutionLimits {
        &self.limits
    }

    /// First candidate from `patches` that passes every test in `tests`.
    pub fn fix(&mut self, source: &str, patches: &[Patch], tests: &TestOracle) -> RepairResult<Option<FixOutcome>> {
        self.fix_with(source, patches, tests)
    }

    pub fn is_fixable(&mut self, source: &str, patches: &[Patch], tests: &TestOracle) -> RepairResult<bool> {
        Ok(self.fix(source, patches, tests)?.is_some())
    }

    /// Search with transformations learned from an example, in rank order.
    pub fn fix_with_transformations(
        &mut self,
        source: &str,
        transformations: &[GeneralizedTransformation],
        tests: &TestOracle,
    ) -> RepairResult<Option<FixOutcome>> {
        self.fix_with(source, transformations, tests)
    }

    /// Same search, drawing candidates from any source.
    pub fn fix_with<S: CandidateSource>(
        &mut self,
        source: &str,
        sources: &[S],
        tests: &TestOracle,
    ) -> RepairResult<Option<FixOutcome>> {
        let tree = self.parser.parse(source).map_err(|e| {
            warn!(error = %e, "submission does not parse, no patch attempted");
            RepairError::FatalParse(e)
        })?;
        if tests.is_empty() {
            warn!("test oracle is empty, the first candidate will be accepted");
        }
        info!(
            sources = sources.len(),
            tests = tests.len(),
            parser = self.parser.name(),
            executor = self.executor.name(),
            "searching for a fix"
        );

        let mut tried = 0;
        for candidate_source in sources {
            if tried >= self.search.max_candidates {
                warn!(max_candidates = self.search.max_candidates, "candidate budget exhausted");
                break;
            }
            let name = candidate_source.name().to_string();
            let start_time = Instant::now();
            let found = self.try_source(candidate_source, &tree, tests, &mut tried);

            let stats = self.stats_mut(&name);
            stats.attempts += 1;
            stats.total_time_ms += start_time.elapsed().as_millis() as u64;

            if let Some(outcome) = found? {
                info!(
                    patch = %outcome.patch_name,
                    location = outcome.location,
                    candidates = outcome.candidates_tried,
                    "found a fix"
                );
                return Ok(Some(outcome));
            }
        }

        info!(candidates = tried, "no candidate passed every test");
        Ok(None)
    }

    fn try_source<S: CandidateSource>(
        &mut self,
        candidate_source: &S,
        tree: &NodeRef,
        tests: &TestOracle,
        tried: &mut usize,
    ) -> RepairResult<Option<FixOutcome>> {
        let name = candidate_source.name();
        let candidates = candidate_source
            .candidates(tree)
            .take(self.search.max_locations_per_patch);
        for (location, candidate) in candidates.enumerate() {
            if *tried >= self.search.max_candidates {
                return Ok(None);
            }
            *tried += 1;

            let candidate = candidate?;
            let program = candidate.to_source();
            self.stats_mut(name).candidates += 1;

            match tests.check(self.executor.as_ref(), &program, &self.limits) {
                Verdict::Pass => {
                    self.stats_mut(name).successes += 1;
                    return Ok(Some(FixOutcome {
                        patch_name: name.to_string(),
                        location,
                        candidates_tried: *tried,
                        source: program,
                        tree: candidate,
                    }));
                }
                Verdict::Fail {
                    input,
                    failure: Failure::Timeout,
                } => {
                    warn!(patch = name, location, %input, "candidate timed out");
                }
                Verdict::Fail { input, failure } => {
                    debug!(patch = name, location, %input, %failure, "candidate rejected");
                }
            }
        }
        Ok(None)
    }

    fn stats_mut(&mut self, name: &str) -> &mut PatchStats {
        self.stats
            .entry(name.to_string())
            .or_insert_with(|| PatchStats::new(name))
    }

    /// Per-patch statistics, in the order patches were first tried
    pub fn stats(&self) -> &IndexMap<String, PatchStats> {
        &self.stats
    }

    pub fn clear_stats(&mut self) {
        self.stats.clear();
    }
}
