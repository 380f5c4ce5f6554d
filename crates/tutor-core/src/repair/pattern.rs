/*!
# Pattern Trees

Template trees mirroring `Node` shape. A pattern node is either exact (same
kind and label as the node it matches) or a wildcard over a whole syntactic
category. Either may carry a slot id capturing the node it matched.

Patterns are usually written as source with metavariables:

- `$_` matches any expression
- `$1` matches any expression and binds it to slot 1
- `$1{0}` matches the literal `0` exactly and binds it to slot 1
- a line holding only a metavariable matches any statement
*/

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{RepairError, RepairResult};
use crate::ast::{Category, Label, Node, NodeKind, NodeRef, SlotId};
use crate::parser::{Parser, PythonParser};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PatternNode {
    /// Same kind and label; `children: None` accepts any children.
    Exact {
        kind: NodeKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<Label>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        children: Option<Vec<PatternNode>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slot: Option<SlotId>,
    },
    /// Any node of the category.
    Wildcard {
        category: Category,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        slot: Option<SlotId>,
    },
}

impl PatternNode {
    pub fn exact(kind: NodeKind, label: Option<Label>, children: Vec<PatternNode>) -> Self {
        PatternNode::Exact {
            kind,
            label,
            children: Some(children),
            slot: None,
        }
    }

    /// Exact match on kind and label only; children are not inspected.
    pub fn shallow(kind: NodeKind, label: Option<Label>) -> Self {
        PatternNode::Exact {
            kind,
            label,
            children: None,
            slot: None,
        }
    }

    pub fn wildcard(category: Category) -> Self {
        PatternNode::Wildcard { category, slot: None }
    }

    pub fn with_slot(self, slot: SlotId) -> Self {
        match self {
            PatternNode::Exact {
                kind, label, children, ..
            } => PatternNode::Exact {
                kind,
                label,
                children,
                slot: Some(slot),
            },
            PatternNode::Wildcard { category, .. } => PatternNode::Wildcard {
                category,
                slot: Some(slot),
            },
        }
    }

    /// Compile a tree into a pattern. Concrete nodes become exact pattern
    /// nodes; `Hole` nodes produced by the pattern parser become wildcards, or
    /// slot-carrying exact nodes when they have a constraint.
    pub fn from_node(node: &Node) -> Self {
        match node.kind() {
            NodeKind::Hole => {
                let slot = match node.label() {
                    Some(Label::Slot(slot)) => *slot,
                    _ => None,
                };
                let compiled = match node.child(0) {
                    Some(constraint) => PatternNode::from_node(constraint),
                    None => PatternNode::wildcard(Category::Expression),
                };
                match slot {
                    Some(slot) => compiled.with_slot(slot),
                    None => compiled,
                }
            }
            NodeKind::ExpressionStatement if is_statement_metavariable(node) => {
                let slot = node.child(0).and_then(|hole| match hole.label() {
                    Some(Label::Slot(slot)) => *slot,
                    _ => None,
                });
                PatternNode::Wildcard {
                    category: Category::Statement,
                    slot,
                }
            }
            kind => PatternNode::exact(
                kind,
                node.label().cloned(),
                node.children().iter().map(|c| PatternNode::from_node(c)).collect(),
            ),
        }
    }

    /// Parse pattern source holding exactly one statement or expression.
    pub fn parse(source: &str) -> RepairResult<Self> {
        let module = PythonParser::patterns()
            .parse(source)
            .map_err(|e| RepairError::invalid_pattern(source, e.to_string()))?;
        let statement = match module.children() {
            [statement] => statement,
            [] => return Err(RepairError::invalid_pattern(source, "pattern is empty")),
            _ => {
                return Err(RepairError::invalid_pattern(
                    source,
                    "pattern must be a single statement or expression",
                ))
            }
        };
        match statement.child(0) {
            Some(expression)
                if statement.kind() == NodeKind::ExpressionStatement
                    && !is_statement_metavariable(statement) =>
            {
                Ok(PatternNode::from_node(expression))
            }
            _ => Ok(PatternNode::from_node(statement)),
        }
    }

    pub fn category(&self) -> Category {
        match self {
            PatternNode::Exact { kind, .. } => kind.category(),
            PatternNode::Wildcard { category, .. } => *category,
        }
    }

    pub fn slot(&self) -> Option<SlotId> {
        match self {
            PatternNode::Exact { slot, .. } | PatternNode::Wildcard { slot, .. } => *slot,
        }
    }

    /// Every slot id used anywhere in the pattern.
    pub fn slots(&self) -> BTreeSet<SlotId> {
        let mut slots = BTreeSet::new();
        self.collect_slots(&mut slots);
        slots
    }

    fn collect_slots(&self, slots: &mut BTreeSet<SlotId>) {
        slots.extend(self.slot());
        if let PatternNode::Exact {
            children: Some(children),
            ..
        } = self
        {
            for child in children {
                child.collect_slots(slots);
            }
        }
    }

    /// True when the pattern describes exactly one tree.
    pub fn is_concrete(&self) -> bool {
        match self {
            PatternNode::Wildcard { .. } => false,
            PatternNode::Exact { kind: NodeKind::Hole, .. } => false,
            PatternNode::Exact {
                children: Some(children),
                ..
            } => children.iter().all(PatternNode::is_concrete),
            PatternNode::Exact { kind, children: None, .. } => kind.is_leaf(),
        }
    }

    /// Build the tree a concrete pattern describes.
    pub fn materialize(&self) -> RepairResult<NodeRef> {
        match self {
            PatternNode::Wildcard { category, .. } => Err(RepairError::invalid_patch(format!(
                "replacement contains an unresolved {category} wildcard"
            ))),
            PatternNode::Exact { kind: NodeKind::Hole, .. } => Err(RepairError::invalid_patch(
                "replacement contains an unresolved metavariable",
            )),
            PatternNode::Exact {
                kind,
                label,
                children,
                ..
            } => {
                let children = match children {
                    Some(children) => children
                        .iter()
                        .map(PatternNode::materialize)
                        .collect::<RepairResult<Vec<_>>>()?,
                    None if kind.is_leaf() => Vec::new(),
                    None => {
                        return Err(RepairError::invalid_patch(format!(
                            "replacement {kind} node does not declare its children"
                        )))
                    }
                };
                Ok(Arc::new(Node::new(*kind, label.clone(), children)))
            }
        }
    }

    /// Number of pattern nodes.
    pub fn size(&self) -> usize {
        match self {
            PatternNode::Exact {
                children: Some(children),
                ..
            } => 1 + children.iter().map(PatternNode::size).sum::<usize>(),
            _ => 1,
        }
    }
}

fn is_statement_metavariable(statement: &Node) -> bool {
    statement.kind() == NodeKind::ExpressionStatement
        && statement
            .child(0)
            .is_some_and(|child| child.kind() == NodeKind::Hole && child.children().is_empty())
}

fn write_label(f: &mut fmt::Formatter<'_>, label: &Label) -> fmt::Result {
    match label {
        Label::Identifier(name) => write!(f, " {name}"),
        Label::Literal(value) => write!(f, " {value}"),
        Label::Operator(op) => write!(f, " {}", op.symbol()),
        Label::Slot(Some(slot)) => write!(f, " ${slot}"),
        Label::Slot(None) => write!(f, " $_"),
    }
}

/// S-expression rendering, e.g. `(assign $_:expression $1{(literal 0)})`.
impl fmt::Display for PatternNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternNode::Wildcard { category, slot } => match slot {
                Some(slot) => write!(f, "${slot}:{category}"),
                None => write!(f, "$_:{category}"),
            },
            PatternNode::Exact {
                kind,
                label,
                children,
                slot,
            } => {
                if let Some(slot) = slot {
                    write!(f, "${slot}{{")?;
                }
                write!(f, "({kind}")?;
                if let Some(label) = label {
                    write_label(f, label)?;
                }
                match children {
                    Some(children) => {
                        for child in children {
                            write!(f, " {child}")?;
                        }
                    }
                    None => write!(f, " ...")?,
                }
                write!(f, ")")?;
                if slot.is_some() {
                    write!(f, "}}")?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::Literal;

    #[test]
    fn test_parse_expression_pattern() {
        let pattern = PatternNode::parse("n == $1{1}").unwrap();
        assert_eq!(pattern.category(), Category::Expression);
        assert_eq!(pattern.to_string(), "(binary == (name n) $1{(literal 1)})");
        assert_eq!(pattern.slots(), BTreeSet::from([1]));
    }

    #[test]
    fn test_parse_statement_pattern_with_wildcards() {
        let pattern = PatternNode::parse("$_ = $2").unwrap();
        assert_eq!(pattern.category(), Category::Statement);
        assert_eq!(pattern.to_string(), "(assign $_:expression $2:expression)");
        assert!(!pattern.is_concrete());
    }

    #[test]
    fn test_lone_metavariable_is_statement_wildcard() {
        let pattern = PatternNode::parse("$3").unwrap();
        assert_eq!(
            pattern,
            PatternNode::Wildcard {
                category: Category::Statement,
                slot: Some(3)
            }
        );
    }

    #[test]
    fn test_parse_rejects_empty_and_multi_statement_patterns() {
        assert!(matches!(
            PatternNode::parse("# nothing here\n"),
            Err(RepairError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PatternNode::parse("x = 1\ny = 2"),
            Err(RepairError::InvalidPattern { .. })
        ));
        assert!(matches!(
            PatternNode::parse("x = ("),
            Err(RepairError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_materialize_concrete_pattern() {
        let pattern = PatternNode::parse("total * 2").unwrap();
        assert!(pattern.is_concrete());
        let node = pattern.materialize().unwrap();
        assert_eq!(node.to_string(), "total * 2");
    }

    #[test]
    fn test_materialize_rejects_wildcards() {
        let pattern = PatternNode::parse("$1 + 1").unwrap();
        assert!(matches!(pattern.materialize(), Err(RepairError::InvalidPatch(_))));

        let shallow = PatternNode::shallow(NodeKind::Call, None);
        assert!(matches!(shallow.materialize(), Err(RepairError::InvalidPatch(_))));

        let leaf = PatternNode::shallow(NodeKind::Literal, Some(Label::Literal(Literal::Int(3))));
        assert_eq!(leaf.materialize().unwrap(), Node::int(3));
    }

    #[test]
    fn test_serde_shape() {
        let pattern = PatternNode::parse("$1{0}").unwrap();
        let json = serde_json::to_value(&pattern).unwrap();
        assert_eq!(json["type"], "exact");
        assert_eq!(json["kind"], "literal");
        assert_eq!(json["slot"], 1);
        let back: PatternNode = serde_json::from_value(json).unwrap();
        assert_eq!(back, pattern);
    }
}
