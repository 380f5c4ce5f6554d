// Top-down tree diff used by the learner.
//
// The diff descends while exactly one child differs. A node whose children
// differ in more than one place, or whose kind or label changed, is the edit
// site. A sequence that lost exactly one entry is a deletion.

use crate::ast::{Node, NodeRef};

/// The single edit that turns one tree into another.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit {
    /// The node at `path` becomes `replacement`.
    Update { path: Vec<usize>, replacement: NodeRef },
    /// The node at `path` is removed from its parent's sequence.
    Delete { path: Vec<usize> },
}

impl Edit {
    /// Path of the node in the `before` tree the edit applies to.
    pub fn path(&self) -> &[usize] {
        match self {
            Edit::Update { path, .. } | Edit::Delete { path } => path,
        }
    }
}

/// `None` when the trees are structurally equal.
pub fn diff(before: &NodeRef, after: &NodeRef) -> Option<Edit> {
    if before == after {
        return None;
    }
    let mut path = Vec::new();
    let mut before = before.clone();
    let mut after = after.clone();
    loop {
        if !same_shell(&before, &after) {
            return Some(Edit::Update { path, replacement: after });
        }
        let (old, new) = (before.children(), after.children());
        if old.len() == new.len() {
            let single = {
                let mut differing = old.iter().zip(new).enumerate().filter(|(_, (a, b))| a != b);
                match (differing.next(), differing.next()) {
                    (Some((index, (a, b))), None) => Some((index, a.clone(), b.clone())),
                    _ => None,
                }
            };
            match single {
                Some((index, next_before, next_after)) => {
                    path.push(index);
                    before = next_before;
                    after = next_after;
                }
                None => return Some(Edit::Update { path, replacement: after }),
            }
        } else if old.len() == new.len() + 1 && before.kind().holds_sequence() {
            return match removed_index(old, new) {
                Some(index) => {
                    path.push(index);
                    Some(Edit::Delete { path })
                }
                None => Some(Edit::Update { path, replacement: after }),
            };
        } else {
            return Some(Edit::Update { path, replacement: after });
        }
    }
}

fn same_shell(a: &Node, b: &Node) -> bool {
    a.kind() == b.kind() && a.label() == b.label()
}

/// Index `i` such that `old` without entry `i` equals `new`.
fn removed_index(old: &[NodeRef], new: &[NodeRef]) -> Option<usize> {
    let split = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    (old[split + 1..] == new[split..]).then_some(split)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ast::node_at;
    use crate::parser::{Parser, PythonParser};

    fn parse(source: &str) -> NodeRef {
        PythonParser::new().parse(source).unwrap()
    }

    #[test]
    fn test_identical_trees_have_no_edit() {
        assert_eq!(diff(&parse("x = 0"), &parse("x = 0")), None);
    }

    #[test]
    fn test_literal_update() {
        let edit = diff(&parse("x = 0"), &parse("x = 1")).unwrap();
        assert_eq!(
            edit,
            Edit::Update {
                path: vec![0, 1],
                replacement: Node::int(1)
            }
        );
    }

    #[test]
    fn test_two_changed_children_update_parent() {
        let before = parse("total, k = 0, 0");
        let edit = diff(&before, &parse("total, k = 1, 1")).unwrap();
        assert_eq!(edit.path(), &[0, 1]);
        assert_eq!(node_at(&before, edit.path()).unwrap().kind(), crate::ast::NodeKind::Tuple);
    }

    #[test]
    fn test_removed_statement_is_delete() {
        let before = parse("def f(x):\n    print(x)\n    return x");
        let edit = diff(&before, &parse("def f(x):\n    return x")).unwrap();
        assert_eq!(edit, Edit::Delete { path: vec![0, 1, 0] });
    }

    #[test]
    fn test_removed_last_element() {
        let edit = diff(&parse("xs = [1, 2]"), &parse("xs = [1]")).unwrap();
        assert_eq!(edit, Edit::Delete { path: vec![0, 1, 1] });
    }

    #[test]
    fn test_changed_kind_is_update() {
        let edit = diff(&parse("return a + b"), &parse("return a * b")).unwrap();
        assert_eq!(edit.path(), &[0, 0]);
    }
}
