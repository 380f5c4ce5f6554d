/*!
# Updates

An update rewrites one previously bound node. The node is located by identity,
so a binding taken from one tree can be applied to any tree that still shares
that node. Only the spine from the root down to the node is rebuilt.

Deleting the expression of an expression statement deletes the statement.
*/

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::pattern::PatternNode;
use super::{RepairError, RepairResult};
use crate::ast::{node_at, path_to, Category, Node, NodeKind, NodeRef};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Update {
    /// Put the materialized pattern where the bound node was.
    Replace(PatternNode),
    /// Remove the bound node from its parent's sequence.
    Delete,
}

impl Update {
    pub fn replace(pattern: PatternNode) -> Self {
        Update::Replace(pattern)
    }

    pub fn replace_with(node: &Node) -> Self {
        Update::Replace(PatternNode::from_node(node))
    }

    /// Replacement given as source, e.g. `"1"` or `"total = 1"`.
    pub fn parse_replacement(source: &str) -> RepairResult<Self> {
        let update = Update::Replace(PatternNode::parse(source)?);
        update.validate()?;
        Ok(update)
    }

    /// A replacement must describe exactly one tree.
    pub fn validate(&self) -> RepairResult<()> {
        match self {
            Update::Replace(pattern) if !pattern.is_concrete() => Err(RepairError::invalid_patch(
                format!("replacement {pattern} is not fully concrete"),
            )),
            _ => Ok(()),
        }
    }

    /// New tree equal to `root` except at `bound`. `root` is left untouched.
    pub fn run(&self, root: &NodeRef, bound: &NodeRef) -> RepairResult<NodeRef> {
        let path = path_to(root, bound)
            .ok_or_else(|| RepairError::invalid_patch(format!("bound {} node is not part of the tree", bound.kind())))?;
        match self {
            Update::Replace(pattern) => {
                let replacement = adapt(pattern.materialize()?, bound.category())?;
                Ok(rebuild_spine(root, &path, replacement))
            }
            Update::Delete => {
                let Some((&index, parent_path)) = path.split_last() else {
                    return Err(RepairError::invalid_patch("cannot delete the root of a tree"));
                };
                let parent = node_at(root, parent_path)
                    .ok_or_else(|| RepairError::invalid_patch("parent of bound node vanished"))?;
                if parent.kind() == NodeKind::ExpressionStatement {
                    return Update::Delete.run(root, &parent);
                }
                if !parent.kind().holds_sequence() {
                    return Err(RepairError::invalid_patch(format!(
                        "cannot delete a child of a {} node",
                        parent.kind()
                    )));
                }
                Ok(rebuild_spine(root, parent_path, Arc::new(parent.without_child(index))))
            }
        }
    }
}

/// Fit a replacement into the category of the slot it fills.
fn adapt(replacement: NodeRef, target: Category) -> RepairResult<NodeRef> {
    let found = replacement.category();
    match (found, target) {
        (found, target) if found == target => Ok(replacement),
        (Category::Expression, Category::Statement) => {
            Ok(Node::branch(NodeKind::ExpressionStatement, vec![replacement]))
        }
        (Category::Statement, Category::Expression) if replacement.kind() == NodeKind::ExpressionStatement => {
            replacement
                .child(0)
                .cloned()
                .ok_or_else(|| RepairError::invalid_patch("empty expression statement"))
        }
        (Category::Statement, Category::Block) => Ok(Node::branch(NodeKind::Suite, vec![replacement])),
        _ => Err(RepairError::invalid_patch(format!(
            "cannot put a {found} where a {target} is expected"
        ))),
    }
}

// Copy only the nodes along `path`; every sibling subtree is shared.
fn rebuild_spine(root: &NodeRef, path: &[usize], replacement: NodeRef) -> NodeRef {
    let mut spine = Vec::with_capacity(path.len());
    let mut current = root.clone();
    for &index in path {
        let next = current.children()[index].clone();
        spine.push(current);
        current = next;
    }
    spine
        .iter()
        .zip(path)
        .rev()
        .fold(replacement, |rebuilt, (parent, &index)| {
            Arc::new(parent.with_child_replaced(index, rebuilt))
        })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::{same_node, ToSource};
    use crate::parser::{Parser, PythonParser};
    use crate::repair::Matcher;

    fn parse(source: &str) -> NodeRef {
        PythonParser::new().parse(source).unwrap()
    }

    fn bound(tree: &NodeRef, pattern: &str, slot: u32) -> NodeRef {
        Matcher::parse(pattern).unwrap().find(tree)[slot][0].clone()
    }

    #[test]
    fn test_replace_literal() {
        let tree = parse("n == 1");
        let node = bound(&tree, "n == $1{1}", 1);
        let rewritten = Update::parse_replacement("0").unwrap().run(&tree, &node).unwrap();
        assert_eq!(rewritten.to_source(), "n == 0\n");
        assert_eq!(tree.to_source(), "n == 1\n");
    }

    #[test]
    fn test_replace_nested_in_function() {
        let source = "\
def accumulate(combiner, base, n, term):
    if n == 1:
        return base
    return combiner(term(n), accumulate(combiner, base, n - 1, term))
";
        let tree = parse(source);
        let node = bound(&tree, "n == $1{1}", 1);
        let rewritten = Update::parse_replacement("0").unwrap().run(&tree, &node).unwrap();
        assert_eq!(rewritten.to_source(), source.replace("n == 1", "n == 0"));
        assert!(parse(&rewritten.to_source()) == rewritten);
    }

    #[test]
    fn test_untouched_subtrees_are_shared() {
        let tree = parse("a = 1\nb = 2\nc = 3");
        let node = bound(&tree, "b = $1{2}", 1);
        let rewritten = Update::parse_replacement("5").unwrap().run(&tree, &node).unwrap();
        assert!(same_node(&tree.children()[0], &rewritten.children()[0]));
        assert!(same_node(&tree.children()[2], &rewritten.children()[2]));
        assert!(!same_node(&tree.children()[1], &rewritten.children()[1]));
        assert!(same_node(
            &tree.children()[1].children()[0],
            &rewritten.children()[1].children()[0]
        ));
    }

    #[test]
    fn test_delete_statement_from_block() {
        let tree = parse("def f(x):\n    print(x)\n    return x");
        let statement = tree.children()[0].children()[1].children()[0].clone();
        let rewritten = Update::Delete.run(&tree, &statement).unwrap();
        assert_eq!(rewritten.to_source(), "def f(x):\n    return x\n");
    }

    #[test]
    fn test_delete_bound_call_removes_its_statement() {
        let tree = parse("def f(x):\n    print(x)\n    return x");
        let call = bound(&tree, "$1{print(x)}", 1);
        assert_eq!(call.kind(), NodeKind::Call);
        let rewritten = Update::Delete.run(&tree, &call).unwrap();
        assert_eq!(rewritten.to_source(), "def f(x):\n    return x\n");

        // A call nested inside a larger expression still has no sequence to leave.
        let tree = parse("y = print(x)");
        let call = bound(&tree, "$1{print(x)}", 1);
        assert!(matches!(Update::Delete.run(&tree, &call), Err(RepairError::InvalidPatch(_))));
    }

    #[test]
    fn test_binding_follows_shared_nodes() {
        let tree = parse("a = 1\nb = 2");
        let literal = bound(&tree, "b = $1{2}", 1);
        let edited = Update::parse_replacement("x = 0")
            .unwrap()
            .run(&tree, &tree.children()[0])
            .unwrap();
        // The second statement is shared, so the old binding still applies.
        let rewritten = Update::parse_replacement("3").unwrap().run(&edited, &literal).unwrap();
        assert_eq!(rewritten.to_source(), "x = 0\nb = 3\n");

        let unrelated = parse("a = 1\nb = 2");
        assert!(matches!(
            Update::parse_replacement("3").unwrap().run(&unrelated, &literal),
            Err(RepairError::InvalidPatch(_))
        ));
    }

    #[test]
    fn test_delete_only_statement_leaves_pass() {
        let tree = parse("while x:\n    x = x - 1");
        let statement = bound(&tree, "$1", 1);
        assert_eq!(statement.kind(), NodeKind::While);
        let inner = tree.children()[0].children()[1].children()[0].clone();
        let rewritten = Update::Delete.run(&tree, &inner).unwrap();
        assert_eq!(rewritten.to_source(), "while x:\n    pass\n");
    }

    #[test]
    fn test_delete_list_element() {
        let tree = parse("xs = [1, 2, 3]");
        let node = bound(&tree, "$1{2}", 1);
        let rewritten = Update::Delete.run(&tree, &node).unwrap();
        assert_eq!(rewritten.to_source(), "xs = [1, 3]\n");
    }

    #[test]
    fn test_invalid_updates() {
        let tree = parse("x = 1");
        let other = parse("x = 1");
        let foreign = other.children()[0].clone();
        assert!(matches!(
            Update::parse_replacement("2").unwrap().run(&tree, &foreign),
            Err(RepairError::InvalidPatch(_))
        ));
        assert!(matches!(Update::Delete.run(&tree, &tree), Err(RepairError::InvalidPatch(_))));
        assert!(matches!(
            Update::parse_replacement("$1 + 1"),
            Err(RepairError::InvalidPatch(_))
        ));
        let wildcard = Update::Replace(PatternNode::wildcard(Category::Expression));
        let literal = bound(&tree, "$1{1}", 1);
        assert!(matches!(wildcard.run(&tree, &literal), Err(RepairError::InvalidPatch(_))));
    }

    #[test]
    fn test_expression_replacement_fills_statement_slot() {
        let tree = parse("x = 1\ny = 2");
        let statement = tree.children()[1].clone();
        let rewritten = Update::parse_replacement("print(x)")
            .unwrap()
            .run(&tree, &statement)
            .unwrap();
        assert_eq!(rewritten.to_source(), "x = 1\nprint(x)\n");
    }
}
