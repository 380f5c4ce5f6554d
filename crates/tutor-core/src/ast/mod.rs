// Uniform tree for the tutor Python subset.
// Every parsed program is a persistent tree of shared `Arc<Node>` handles. A
// node never changes after construction; rewrites build a new spine and share
// everything else with the tree they started from.

pub mod source_gen;
pub use source_gen::ToSource;

#[cfg(test)]
mod source_gen_tests;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Shared handle to an immutable node. Identity (`Arc::ptr_eq`) is what a
/// binding refers to; equality (`==`) is structural.
pub type NodeRef = Arc<Node>;

/// Capture point identifier used by pattern metavariables (`$1`, `$2{...}`).
pub type SlotId = u32;

/// Syntactic category of a node. Patterns never match across categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Module,
    Block,
    Statement,
    Expression,
    Parameters,
}

impl Category {
    pub fn name(self) -> &'static str {
        match self {
            Category::Module => "module",
            Category::Block => "block",
            Category::Statement => "statement",
            Category::Expression => "expression",
            Category::Parameters => "parameters",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "module" => Some(Category::Module),
            "block" => Some(Category::Block),
            "statement" => Some(Category::Statement),
            "expression" => Some(Category::Expression),
            "parameters" => Some(Category::Parameters),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Node kind tag. The comment on each variant gives its child layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// statements...
    Module,
    /// statements...
    Suite,
    /// label: name; [Parameters, Suite]
    FunctionDef,
    /// Name...
    Parameters,
    /// [test, Suite] or [test, Suite, else Suite]
    If,
    /// [test, Suite]
    While,
    /// [target, iterable, Suite]
    For,
    /// [] or [value]
    Return,
    /// [target, value]
    Assign,
    /// label: operator; [target, value]
    AugAssign,
    /// [expression]
    ExpressionStatement,
    Pass,
    Break,
    Continue,

    /// label: identifier
    Name,
    /// label: literal
    Literal,
    /// label: operator; [left, right]
    BinaryOp,
    /// label: `and` / `or`; [left, right]
    BoolOp,
    /// label: operator; [operand]
    UnaryOp,
    /// [callee, arguments...]
    Call,
    /// elements...
    Tuple,
    /// elements...
    List,
    /// [value, index]
    Subscript,
    /// [Parameters, body]
    Lambda,
    /// [body, test, orelse]
    Conditional,
    /// Pattern metavariable, only produced when parsing patterns.
    /// label: slot; [] or [constraint]
    Hole,
}

impl NodeKind {
    pub fn category(self) -> Category {
        match self {
            NodeKind::Module => Category::Module,
            NodeKind::Suite => Category::Block,
            NodeKind::Parameters => Category::Parameters,
            NodeKind::FunctionDef
            | NodeKind::If
            | NodeKind::While
            | NodeKind::For
            | NodeKind::Return
            | NodeKind::Assign
            | NodeKind::AugAssign
            | NodeKind::ExpressionStatement
            | NodeKind::Pass
            | NodeKind::Break
            | NodeKind::Continue => Category::Statement,
            NodeKind::Name
            | NodeKind::Literal
            | NodeKind::BinaryOp
            | NodeKind::BoolOp
            | NodeKind::UnaryOp
            | NodeKind::Call
            | NodeKind::Tuple
            | NodeKind::List
            | NodeKind::Subscript
            | NodeKind::Lambda
            | NodeKind::Conditional
            | NodeKind::Hole => Category::Expression,
        }
    }

    /// Short lowercase name, as reported in match results and logs.
    pub fn name(self) -> &'static str {
        match self {
            NodeKind::Module => "module",
            NodeKind::Suite => "suite",
            NodeKind::FunctionDef => "function",
            NodeKind::Parameters => "parameters",
            NodeKind::If => "if",
            NodeKind::While => "while",
            NodeKind::For => "for",
            NodeKind::Return => "return",
            NodeKind::Assign => "assign",
            NodeKind::AugAssign => "augassign",
            NodeKind::ExpressionStatement => "expression_statement",
            NodeKind::Pass => "pass",
            NodeKind::Break => "break",
            NodeKind::Continue => "continue",
            NodeKind::Name => "name",
            NodeKind::Literal => "literal",
            NodeKind::BinaryOp => "binary",
            NodeKind::BoolOp => "boolean",
            NodeKind::UnaryOp => "unary",
            NodeKind::Call => "call",
            NodeKind::Tuple => "tuple",
            NodeKind::List => "list",
            NodeKind::Subscript => "subscript",
            NodeKind::Lambda => "lambda",
            NodeKind::Conditional => "conditional",
            NodeKind::Hole => "hole",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        const ALL: [NodeKind; 26] = [
            NodeKind::Module,
            NodeKind::Suite,
            NodeKind::FunctionDef,
            NodeKind::Parameters,
            NodeKind::If,
            NodeKind::While,
            NodeKind::For,
            NodeKind::Return,
            NodeKind::Assign,
            NodeKind::AugAssign,
            NodeKind::ExpressionStatement,
            NodeKind::Pass,
            NodeKind::Break,
            NodeKind::Continue,
            NodeKind::Name,
            NodeKind::Literal,
            NodeKind::BinaryOp,
            NodeKind::BoolOp,
            NodeKind::UnaryOp,
            NodeKind::Call,
            NodeKind::Tuple,
            NodeKind::List,
            NodeKind::Subscript,
            NodeKind::Lambda,
            NodeKind::Conditional,
            NodeKind::Hole,
        ];
        ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Whether the children form a homogeneous ordered collection, so that
    /// removing one entry still leaves a well-formed node.
    pub fn holds_sequence(self) -> bool {
        matches!(
            self,
            NodeKind::Module | NodeKind::Suite | NodeKind::Parameters | NodeKind::Tuple | NodeKind::List
        )
    }

    /// Kinds that never have children.
    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            NodeKind::Name | NodeKind::Literal | NodeKind::Pass | NodeKind::Break | NodeKind::Continue
        )
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Constant value carried by a `Literal` node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Literal {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
    And,
    Or,
    Not,
    Neg,
    Pos,
}

impl Operator {
    pub fn symbol(self) -> &'static str {
        match self {
            Operator::Add => "+",
            Operator::Sub => "-",
            Operator::Mul => "*",
            Operator::Div => "/",
            Operator::FloorDiv => "//",
            Operator::Mod => "%",
            Operator::Pow => "**",
            Operator::Eq => "==",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtE => "<=",
            Operator::Gt => ">",
            Operator::GtE => ">=",
            Operator::In => "in",
            Operator::NotIn => "not in",
            Operator::Is => "is",
            Operator::IsNot => "is not",
            Operator::And => "and",
            Operator::Or => "or",
            Operator::Not => "not",
            Operator::Neg => "-",
            Operator::Pos => "+",
        }
    }

    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Operator::Eq
                | Operator::NotEq
                | Operator::Lt
                | Operator::LtE
                | Operator::Gt
                | Operator::GtE
                | Operator::In
                | Operator::NotIn
                | Operator::Is
                | Operator::IsNot
        )
    }
}

/// Payload distinguishing nodes of the same kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Identifier(String),
    Literal(Literal),
    Operator(Operator),
    /// Metavariable slot; `None` is the anonymous `$_`.
    Slot(Option<SlotId>),
}

/// One element of a parsed program.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    kind: NodeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    label: Option<Label>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    children: Vec<NodeRef>,
}

impl Node {
    pub fn new(kind: NodeKind, label: Option<Label>, children: Vec<NodeRef>) -> Self {
        Self {
            kind,
            label,
            children,
        }
    }

    pub fn branch(kind: NodeKind, children: Vec<NodeRef>) -> NodeRef {
        Arc::new(Self::new(kind, None, children))
    }

    pub fn name(identifier: impl Into<String>) -> NodeRef {
        Arc::new(Self::new(
            NodeKind::Name,
            Some(Label::Identifier(identifier.into())),
            Vec::new(),
        ))
    }

    pub fn literal(value: Literal) -> NodeRef {
        Arc::new(Self::new(NodeKind::Literal, Some(Label::Literal(value)), Vec::new()))
    }

    pub fn int(value: i64) -> NodeRef {
        Self::literal(Literal::Int(value))
    }

    pub fn binary(op: Operator, left: NodeRef, right: NodeRef) -> NodeRef {
        Arc::new(Self::new(
            NodeKind::BinaryOp,
            Some(Label::Operator(op)),
            vec![left, right],
        ))
    }

    pub fn into_ref(self) -> NodeRef {
        Arc::new(self)
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn category(&self) -> Category {
        self.kind.category()
    }

    /// Same as `kind().name()`; kept as the reporting name for bound nodes.
    pub fn node_name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn label(&self) -> Option<&Label> {
        self.label.as_ref()
    }

    pub fn children(&self) -> &[NodeRef] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&NodeRef> {
        self.children.get(index)
    }

    pub fn identifier(&self) -> Option<&str> {
        match &self.label {
            Some(Label::Identifier(name)) => Some(name),
            _ => None,
        }
    }

    pub fn literal_value(&self) -> Option<&Literal> {
        match &self.label {
            Some(Label::Literal(value)) => Some(value),
            _ => None,
        }
    }

    pub fn operator(&self) -> Option<Operator> {
        match &self.label {
            Some(Label::Operator(op)) => Some(*op),
            _ => None,
        }
    }

    /// Copy of this node (kind and label) over a new child list.
    pub fn with_children(&self, children: Vec<NodeRef>) -> Node {
        Node::new(self.kind, self.label.clone(), children)
    }

    pub fn with_child_replaced(&self, index: usize, replacement: NodeRef) -> Node {
        let mut children = self.children.clone();
        children[index] = replacement;
        self.with_children(children)
    }

    pub fn without_child(&self, index: usize) -> Node {
        let mut children = self.children.clone();
        children.remove(index);
        self.with_children(children)
    }

    /// Number of nodes in this subtree.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(|c| c.size()).sum::<usize>()
    }

    pub fn contains_hole(&self) -> bool {
        self.kind == NodeKind::Hole || self.children.iter().any(|c| c.contains_hole())
    }

    /// A module without statements; the matcher treats it as the empty tree.
    pub fn is_empty_module(&self) -> bool {
        self.kind == NodeKind::Module && self.children.is_empty()
    }
}

/// Pre-order walk over a tree, yielding shared handles.
pub struct Preorder {
    stack: Vec<NodeRef>,
}

impl Preorder {
    pub fn new(root: &NodeRef) -> Self {
        Self {
            stack: vec![root.clone()],
        }
    }

    pub fn empty() -> Self {
        Self { stack: Vec::new() }
    }
}

impl Iterator for Preorder {
    type Item = NodeRef;

    fn next(&mut self) -> Option<NodeRef> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children().iter().rev().cloned());
        Some(node)
    }
}

/// Whether two handles refer to the same node (not just equal subtrees).
pub fn same_node(a: &NodeRef, b: &NodeRef) -> bool {
    Arc::ptr_eq(a, b)
}

/// Child-index path from `root` to `target`, located by identity.
pub fn path_to(root: &NodeRef, target: &NodeRef) -> Option<Vec<usize>> {
    fn walk(node: &NodeRef, target: &NodeRef, path: &mut Vec<usize>) -> bool {
        if same_node(node, target) {
            return true;
        }
        for (index, child) in node.children().iter().enumerate() {
            path.push(index);
            if walk(child, target, path) {
                return true;
            }
            path.pop();
        }
        false
    }

    let mut path = Vec::new();
    walk(root, target, &mut path).then_some(path)
}

/// Follow a child-index path from `root`.
pub fn node_at(root: &NodeRef, path: &[usize]) -> Option<NodeRef> {
    let mut current = root.clone();
    for &index in path {
        current = current.child(index)?.clone();
    }
    Some(current)
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::None => write!(f, "None"),
            Literal::Bool(true) => write!(f, "True"),
            Literal::Bool(false) => write!(f, "False"),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(x) => write!(f, "{}", source_gen::format_float(*x)),
            Literal::Str(s) => write!(f, "{}", source_gen::quote_string(s)),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.category() {
            Category::Expression => f.write_str(&source_gen::expression(self)),
            _ => f.write_str(self.to_source().trim_end()),
        }
    }
}
