/*!
# Example Learner

Generalizes one before/after pair into ranked transformations.

The pair is diffed down to its single edit site. For each anchoring depth, from
the grammar's `context` down to zero, the learner builds a pattern rooted that
many levels above the edit, with the edited node bound to slot 1. Each depth
contributes an abstracted variant (sibling subtrees the grammar lets it
generalize become wildcards) ahead of the concrete one. Deeper anchors rank
first because they are less likely to fire in the wrong place.
*/

use tracing::{debug, info};

use super::diff::{diff, Edit};
use super::grammar::{EditGrammar, EditOperator};
use super::transformation::GeneralizedTransformation;
use crate::ast::{node_at, Category, NodeRef};
use crate::parser::{Parser, PythonParser};
use crate::repair::{Patch, PatternNode, RepairError, RepairResult, Update, DEFAULT_SLOT};

/// Learns transformations from a single example.
pub trait SynthesisEngine {
    /// Ranked transformations consistent with `before -> after`, most likely
    /// first. Empty when nothing in the grammar's vocabulary explains the pair.
    fn learn(&self, before: &NodeRef, after: &NodeRef) -> Vec<GeneralizedTransformation>;

    /// Get engine name for debugging
    fn name(&self) -> &'static str;
}

#[derive(Debug, Clone, Default)]
pub struct ExampleLearner {
    grammar: EditGrammar,
}

struct Candidate {
    pattern: PatternNode,
    depth: usize,
    abstracted: bool,
}

impl ExampleLearner {
    pub fn new(grammar: EditGrammar) -> Self {
        Self { grammar }
    }

    pub fn grammar(&self) -> &EditGrammar {
        &self.grammar
    }

    /// Parse both sides of the example, then learn.
    pub fn learn_from_source(&self, before: &str, after: &str) -> RepairResult<Vec<GeneralizedTransformation>> {
        let parser = PythonParser::new();
        let before = parser.parse(before).map_err(RepairError::FatalParse)?;
        let after = parser.parse(after).map_err(RepairError::FatalParse)?;
        Ok(self.learn(&before, &after))
    }

    fn candidates(&self, before: &NodeRef, edit_path: &[usize]) -> Vec<Candidate> {
        let mut candidates: Vec<Candidate> = Vec::new();
        let deepest = self.grammar.context_depth.min(edit_path.len());
        for depth in (0..=deepest).rev() {
            let (anchor_path, relative) = edit_path.split_at(edit_path.len() - depth);
            let Some(anchor) = node_at(before, anchor_path) else {
                continue;
            };
            if anchor.category() == Category::Module {
                continue;
            }
            for abstracted in [true, false] {
                let grammar = abstracted.then_some(&self.grammar);
                let pattern = anchored_pattern(&anchor, relative, grammar);
                if candidates.iter().all(|c| c.pattern != pattern) {
                    candidates.push(Candidate {
                        pattern,
                        depth,
                        abstracted,
                    });
                }
            }
        }
        candidates
    }
}

impl SynthesisEngine for ExampleLearner {
    fn learn(&self, before: &NodeRef, after: &NodeRef) -> Vec<GeneralizedTransformation> {
        let Some(edit) = diff(before, after) else {
            debug!("example has no edit");
            return Vec::new();
        };
        let (operator, update) = match &edit {
            Edit::Update { replacement, .. } => (EditOperator::Update, Update::replace_with(replacement)),
            Edit::Delete { .. } => (EditOperator::Delete, Update::Delete),
        };
        if !self.grammar.allows(operator) {
            debug!(operator = operator.name(), "edit operator not enabled by the grammar");
            return Vec::new();
        }

        let mut learned = Vec::new();
        for (rank, candidate) in self
            .candidates(before, edit.path())
            .into_iter()
            .take(self.grammar.limit)
            .enumerate()
        {
            let description = format!(
                "{} at depth {}{}: {}",
                operator.name(),
                candidate.depth,
                if candidate.abstracted { " (abstracted)" } else { "" },
                candidate.pattern
            );
            let name = format!("learned-{}", rank + 1);
            match Patch::new(name, candidate.pattern, update.clone()) {
                Ok(patch) => {
                    let score = 1.0 / (rank + 1) as f64;
                    learned.push(GeneralizedTransformation::new(patch, score, description));
                }
                Err(e) => debug!(error = %e, "discarding candidate transformation"),
            }
        }

        info!(
            operator = operator.name(),
            transformations = learned.len(),
            "learned from example"
        );
        learned
    }

    fn name(&self) -> &'static str {
        "example-learner"
    }
}

/// Pattern for the subtree at `node`, exact along `edit_path`, with the edited
/// node bound to the default slot. With a grammar, siblings it abstracts
/// become wildcards.
fn anchored_pattern(node: &NodeRef, edit_path: &[usize], grammar: Option<&EditGrammar>) -> PatternNode {
    let Some((&index, rest)) = edit_path.split_first() else {
        return PatternNode::from_node(node).with_slot(DEFAULT_SLOT);
    };
    let children = node
        .children()
        .iter()
        .enumerate()
        .map(|(position, child)| {
            if position == index {
                anchored_pattern(child, rest, grammar)
            } else {
                match grammar {
                    Some(grammar) if grammar.abstracts(child) => PatternNode::wildcard(child.category()),
                    _ => PatternNode::from_node(child),
                }
            }
        })
        .collect();
    PatternNode::exact(node.kind(), node.label().cloned(), children)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::ToSource;

    fn parse(source: &str) -> NodeRef {
        PythonParser::new().parse(source).unwrap()
    }

    fn learner() -> ExampleLearner {
        ExampleLearner::default()
    }

    fn outputs(transformation: &GeneralizedTransformation, source: &str) -> Vec<String> {
        let tree = parse(source);
        transformation.invoke(&tree).map(|t| t.to_source()).collect()
    }

    #[test]
    fn test_learn_literal_update() {
        let learned = learner().learn(&parse("x = 0"), &parse("x = 1"));
        assert_eq!(learned.len(), 3);
        let top = &learned[0];
        assert_eq!(top.pattern().to_string(), "(assign $_:expression $1{(literal 0)})");
        assert_eq!(outputs(top, "x = 0"), vec!["x = 1\n"]);
        assert!(outputs(top, "1 == 0").is_empty());
        assert!(learned.windows(2).all(|w| w[0].score() > w[1].score()));
    }

    #[test]
    fn test_abstracted_variant_generalizes_over_names() {
        let learned = learner().learn(&parse("x = 0"), &parse("x = 1"));
        assert_eq!(outputs(&learned[0], "total = 0"), vec!["total = 1\n"]);
        assert_eq!(learned[1].pattern().to_string(), "(assign (name x) $1{(literal 0)})");
        assert!(outputs(&learned[1], "total = 0").is_empty());
        // The bare literal pattern fires anywhere.
        assert_eq!(outputs(&learned[2], "1 == 0"), vec!["1 == 1\n"]);
    }

    #[test]
    fn test_learn_deletion() {
        let before = parse("def f(x):\n    print(x)\n    return x");
        let after = parse("def f(x):\n    return x");
        let learned = learner().learn(&before, &after);
        // Statements are never abstracted, so each depth yields one pattern.
        assert_eq!(learned.len(), 2);
        assert_eq!(learned[0].update(), &Update::Delete);

        let program = "def g(y):\n    print(x)\n    return y * 2";
        assert!(outputs(&learned[0], program).is_empty());
        assert_eq!(outputs(&learned[1], program), vec!["def g(y):\n    return y * 2\n"]);
    }

    #[test]
    fn test_no_edit_or_disabled_operator_learns_nothing() {
        assert!(learner().learn(&parse("x = 0"), &parse("x = 0")).is_empty());

        let grammar: EditGrammar = "language transformation; edit update;".parse().unwrap();
        let before = parse("print(1)\nx = 0");
        let after = parse("x = 0");
        assert!(ExampleLearner::new(grammar).learn(&before, &after).is_empty());
    }

    #[test]
    fn test_limit_and_context() {
        let grammar: EditGrammar = "language transformation; edit update; context 3; limit 2;"
            .parse()
            .unwrap();
        let learned = ExampleLearner::new(grammar).learn(&parse("y = f(x + 0)"), &parse("y = f(x + 1)"));
        assert_eq!(learned.len(), 2);
        assert_eq!(learned[0].name(), "learned-1");
        assert!(learned[0].description().contains("depth 3"));
    }

    #[test]
    fn test_learn_from_source_rejects_bad_input() {
        assert!(matches!(
            learner().learn_from_source("x = (", "x = 1"),
            Err(RepairError::FatalParse(_))
        ));
    }
}
