/*!
# Patches

A patch pairs a pattern (what to find) with an update (how to rewrite the node
bound to one of its slots). Resolving a patch against a tree yields one
candidate tree per matched location, lazily.
*/

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::matcher::{Match, Matcher};
use super::pattern::PatternNode;
use super::update::Update;
use super::{RepairError, RepairResult, DEFAULT_SLOT};
use crate::ast::{NodeRef, SlotId};

#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    name: String,
    matcher: Matcher,
    /// Slot whose node is rewritten; `None` rewrites the match root.
    slot: Option<SlotId>,
    update: Update,
}

impl Patch {
    /// Rewrites slot 1 when the pattern binds it, otherwise the match root.
    pub fn new(name: impl Into<String>, pattern: PatternNode, update: Update) -> RepairResult<Self> {
        update.validate()?;
        let slot = pattern.slots().contains(&DEFAULT_SLOT).then_some(DEFAULT_SLOT);
        Ok(Self {
            name: name.into(),
            matcher: Matcher::new(pattern),
            slot,
            update,
        })
    }

    pub fn with_slot(mut self, slot: SlotId) -> RepairResult<Self> {
        if !self.matcher.pattern().slots().contains(&slot) {
            return Err(RepairError::invalid_patch(format!(
                "patch {:?} rewrites slot {slot}, which its pattern never binds",
                self.name
            )));
        }
        self.slot = Some(slot);
        Ok(self)
    }

    pub fn from_spec(name: impl Into<String>, spec: &PatchSpec) -> RepairResult<Self> {
        let update = match &spec.update {
            UpdateSpec::Replace(source) => Update::parse_replacement(source)?,
            UpdateSpec::Delete => Update::Delete,
        };
        let patch = Patch::new(name, PatternNode::parse(&spec.pattern)?, update)?;
        match spec.slot {
            Some(slot) => patch.with_slot(slot),
            None => Ok(patch),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    pub fn slot(&self) -> Option<SlotId> {
        self.slot
    }

    pub fn update(&self) -> &Update {
        &self.update
    }

    /// Node the update rewrites at one match location.
    pub fn target<'a>(&self, found: &'a Match) -> Option<&'a NodeRef> {
        match self.slot {
            Some(slot) => found.get(slot),
            None => Some(&found.root),
        }
    }

    /// One rewritten tree per matched location, in traversal order.
    pub fn candidates<'p>(&'p self, tree: &'p NodeRef) -> impl Iterator<Item = RepairResult<NodeRef>> + 'p {
        self.matcher
            .matches(tree)
            .filter_map(move |found| self.target(&found).cloned())
            .map(move |target| self.update.run(tree, &target))
    }
}

/// Serialized form of a patch, as stored in patch files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub pattern: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<SlotId>,
    pub update: UpdateSpec,
}

/// `{"replace": "<source>"}` or `"delete"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSpec {
    Replace(String),
    Delete,
}

/// Parse a JSON list of patch specs. Unnamed patches are called `patch-N`.
pub fn parse_patches(json: &str) -> Result<Vec<Patch>> {
    let specs: Vec<PatchSpec> = serde_json::from_str(json).context("Failed to parse patch list")?;
    specs
        .iter()
        .enumerate()
        .map(|(index, spec)| {
            let name = spec.name.clone().unwrap_or_else(|| format!("patch-{}", index + 1));
            Patch::from_spec(name.clone(), spec).with_context(|| format!("Invalid patch {name:?}"))
        })
        .collect()
}

pub fn load_patches(path: &Path) -> Result<Vec<Patch>> {
    let json = fs::read_to_string(path).with_context(|| format!("Failed to read patches from {path:?}"))?;
    parse_patches(&json).with_context(|| format!("Failed to load patches from {path:?}"))
}

/// Statistics for one patch across fixes
#[derive(Debug, Default, Clone, Serialize)]
pub struct PatchStats {
    pub patch_name: String,
    /// Fixes in which the patch was tried
    pub attempts: u64,
    /// Candidate programs it produced
    pub candidates: u64,
    /// Candidates that passed every test
    pub successes: u64,
    pub total_time_ms: u64,
}

impl PatchStats {
    pub fn new(patch_name: &str) -> Self {
        Self {
            patch_name: patch_name.to_string(),
            ..Default::default()
        }
    }

    pub fn success_rate(&self) -> f64 {
        if self.candidates == 0 {
            0.0
        } else {
            self.successes as f64 / self.candidates as f64
        }
    }

    pub fn average_time_ms(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            self.total_time_ms as f64 / self.attempts as f64
        }
    }
}
