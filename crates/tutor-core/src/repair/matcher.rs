/*!
# Structural Matcher

Pre-order search for every location where a pattern matches. Matching at one
location is a recursive structural test of the pattern root against the node;
the walk never stops at the first hit.
*/

use std::collections::BTreeMap;
use std::ops::Index;

use tracing::trace;

use super::pattern::PatternNode;
use super::RepairResult;
use crate::ast::{NodeRef, Preorder, SlotId};

/// One location where the whole pattern matched.
#[derive(Debug, Clone)]
pub struct Match {
    /// Node the pattern root matched.
    pub root: NodeRef,
    /// Node captured by each slot at this location.
    pub bindings: BTreeMap<SlotId, NodeRef>,
}

impl Match {
    pub fn get(&self, slot: SlotId) -> Option<&NodeRef> {
        self.bindings.get(&slot)
    }
}

/// Every match of one pattern against one tree, in traversal order.
///
/// For each slot the pattern binds, `result[slot]` holds exactly one node per
/// matched location.
#[derive(Debug, Clone, Default)]
pub struct MatchResult {
    locations: Vec<NodeRef>,
    bindings: BTreeMap<SlotId, Vec<NodeRef>>,
}

impl MatchResult {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Number of matched locations.
    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn locations(&self) -> &[NodeRef] {
        &self.locations
    }

    /// Bound slots and their nodes, ordered by slot id.
    pub fn bindings(&self) -> impl Iterator<Item = (SlotId, &[NodeRef])> {
        self.bindings.iter().map(|(slot, nodes)| (*slot, nodes.as_slice()))
    }

    fn push(&mut self, found: Match) {
        self.locations.push(found.root);
        for (slot, node) in found.bindings {
            self.bindings.entry(slot).or_default().push(node);
        }
    }
}

impl Index<SlotId> for MatchResult {
    type Output = [NodeRef];

    /// Nodes bound to `slot`; empty when the slot never bound.
    fn index(&self, slot: SlotId) -> &[NodeRef] {
        self.bindings.get(&slot).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Matcher {
    pattern: PatternNode,
}

impl Matcher {
    pub fn new(pattern: PatternNode) -> Self {
        Self { pattern }
    }

    /// Compile pattern source; see `PatternNode::parse`.
    pub fn parse(source: &str) -> RepairResult<Self> {
        PatternNode::parse(source).map(Self::new)
    }

    pub fn pattern(&self) -> &PatternNode {
        &self.pattern
    }

    /// Lazily enumerate matches over `tree` in pre-order.
    pub fn matches(&self, tree: &NodeRef) -> Matches<'_> {
        let walk = if tree.is_empty_module() {
            Preorder::empty()
        } else {
            Preorder::new(tree)
        };
        Matches {
            pattern: &self.pattern,
            walk,
        }
    }

    pub fn has_match(&self, tree: &NodeRef) -> bool {
        self.matches(tree).next().is_some()
    }

    /// Collect every match into a `MatchResult`.
    pub fn find(&self, tree: &NodeRef) -> MatchResult {
        let mut result = MatchResult::default();
        for found in self.matches(tree) {
            result.push(found);
        }
        trace!(pattern = %self.pattern, locations = result.len(), "matched");
        result
    }

    /// Test the pattern root against `node` alone.
    pub fn match_at(&self, node: &NodeRef) -> Option<Match> {
        let mut bindings = BTreeMap::new();
        match_node(&self.pattern, node, &mut bindings).then(|| Match {
            root: node.clone(),
            bindings,
        })
    }
}

/// Iterator returned by `Matcher::matches`.
pub struct Matches<'m> {
    pattern: &'m PatternNode,
    walk: Preorder,
}

impl Iterator for Matches<'_> {
    type Item = Match;

    fn next(&mut self) -> Option<Match> {
        for node in self.walk.by_ref() {
            let mut bindings = BTreeMap::new();
            if match_node(self.pattern, &node, &mut bindings) {
                return Some(Match { root: node, bindings });
            }
        }
        None
    }
}

fn match_node(pattern: &PatternNode, node: &NodeRef, bindings: &mut BTreeMap<SlotId, NodeRef>) -> bool {
    if pattern.category() != node.category() {
        return false;
    }
    match pattern {
        PatternNode::Wildcard { slot, .. } => {
            bind(*slot, node, bindings);
            true
        }
        PatternNode::Exact {
            kind,
            label,
            children,
            slot,
        } => {
            if *kind != node.kind() || label.as_ref() != node.label() {
                return false;
            }
            bind(*slot, node, bindings);
            match children {
                None => true,
                Some(children) => {
                    children.len() == node.children().len()
                        && children
                            .iter()
                            .zip(node.children())
                            .all(|(pattern, child)| match_node(pattern, child, bindings))
                }
            }
        }
    }
}

// First position in pre-order keeps a reused slot.
fn bind(slot: Option<SlotId>, node: &NodeRef, bindings: &mut BTreeMap<SlotId, NodeRef>) {
    if let Some(slot) = slot {
        bindings.entry(slot).or_insert_with(|| node.clone());
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::{same_node, Category, Literal, Node, NodeKind};
    use crate::parser::{Parser, PythonParser};

    fn parse(source: &str) -> NodeRef {
        PythonParser::new().parse(source).unwrap()
    }

    fn matcher(pattern: &str) -> Matcher {
        Matcher::parse(pattern).unwrap()
    }

    #[test]
    fn test_concrete_pattern_matches_identical_tree() {
        let tree = parse("x = 0");
        let result = matcher("x = 0").find(&tree);
        assert_eq!(result.len(), 1);
        assert_eq!(result.bindings().count(), 0);
        assert!(matcher("x = 0").has_match(&tree));
        assert!(!matcher("x = 1").has_match(&tree));
    }

    #[test]
    fn test_slot_binds_exact_literal() {
        let tree = parse("n == 1");
        let result = matcher("n == $1{1}").find(&tree);
        assert_eq!(result[1].len(), 1);
        assert_eq!(result[1][0].literal_value(), Some(&Literal::Int(1)));
        assert!(same_node(&result[1][0], &tree.children()[0].children()[0].children()[1]));
    }

    #[test]
    fn test_all_locations_are_enumerated_in_preorder() {
        let tree = parse("a = 0\nif a == 0:\n    b = [0, 1, 0]");
        let result = matcher("$1{0}").find(&tree);
        assert_eq!(result.len(), 4);
        assert_eq!(result[1].len(), result.len());
        let first = &tree.children()[0].children()[1];
        assert!(same_node(&result[1][0], first));
    }

    #[test]
    fn test_missing_slot_indexes_empty() {
        let result = matcher("x").find(&parse("x + 1"));
        assert_eq!(result.len(), 1);
        assert!(result[7].is_empty());
    }

    #[test]
    fn test_categories_never_cross() {
        // A statement wildcard must not match the expressions inside it.
        let tree = parse("f(1)");
        let result = matcher("$1").find(&tree);
        assert_eq!(result.len(), 1);
        assert_eq!(result[1][0].kind(), NodeKind::ExpressionStatement);

        let expressions = Matcher::new(PatternNode::wildcard(Category::Expression)).find(&tree);
        assert_eq!(expressions.len(), 3);
    }

    #[test]
    fn test_empty_tree_and_empty_pattern_never_match() {
        let empty = parse("");
        assert!(!Matcher::new(PatternNode::wildcard(Category::Module)).has_match(&empty));
        assert!(!matcher("$_").has_match(&empty));
    }

    #[test]
    fn test_reused_slot_binds_first_position() {
        let tree = parse("a + b");
        let found = matcher("$1 + $1").matches(&tree).next().unwrap();
        assert_eq!(found.bindings.len(), 1);
        assert_eq!(found.get(1).unwrap().identifier(), Some("a"));
    }

    #[test]
    fn test_shallow_pattern_ignores_children() {
        let tree = parse("print(1, 2)\nlen(x)");
        let calls = Matcher::new(PatternNode::shallow(NodeKind::Call, None)).find(&tree);
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn test_match_at_checks_single_node() {
        let node = Node::binary(crate::ast::Operator::Add, Node::name("a"), Node::int(1));
        assert!(matcher("$1 + 1").match_at(&node).is_some());
        assert!(matcher("$1 - 1").match_at(&node).is_none());
    }

    #[test]
    fn test_matching_in_nested_function() {
        let tree = parse(
            "def accumulate(combiner, base, n, term):\n    if n == 1:\n        return base\n    return combiner(term(n), accumulate(combiner, base, n - 1, term))",
        );
        let result = matcher("n == $1{1}").find(&tree);
        assert_eq!(result.len(), 1);
        assert_eq!(result[1][0].to_string(), "1");
    }
}
