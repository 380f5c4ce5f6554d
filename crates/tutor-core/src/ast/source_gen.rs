// Source code generation from the tree
// Output is canonical rather than faithful: four-space indentation, one
// statement per line and only the parentheses precedence requires.

use super::*;

const INDENT: &str = "    ";

/// Trait for types that can generate their source code representation
pub trait ToSource {
    fn to_source(&self) -> String;
}

impl ToSource for Node {
    fn to_source(&self) -> String {
        let mut out = String::new();
        match self.kind() {
            NodeKind::Module => {
                for stmt in self.children() {
                    write_statement(stmt, 0, &mut out);
                }
            }
            NodeKind::Suite => write_suite(self, 0, &mut out),
            NodeKind::Parameters => out.push_str(&parameters(self)),
            _ if self.category() == Category::Statement => write_statement(self, 0, &mut out),
            _ => out.push_str(&bare_expression(self)),
        }
        out
    }
}

impl ToSource for NodeRef {
    fn to_source(&self) -> String {
        self.as_ref().to_source()
    }
}

/// Render an expression with the minimal parenthesization.
pub fn expression(node: &Node) -> String {
    render(node, 0)
}

/// Float literal text that reads back as a float.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        "float('nan')".to_string()
    } else if value.is_infinite() {
        if value > 0.0 {
            "float('inf')".to_string()
        } else {
            "-float('inf')".to_string()
        }
    } else {
        // Debug switches to an exponent from 1e16 up.
        let text = format!("{value:?}");
        if text.contains(['.', 'e', 'E']) {
            text
        } else {
            format!("{text}.0")
        }
    }
}

pub fn quote_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

fn write_line(indent: usize, text: &str, out: &mut String) {
    for _ in 0..indent {
        out.push_str(INDENT);
    }
    out.push_str(text);
    out.push('\n');
}

fn write_suite(suite: &Node, indent: usize, out: &mut String) {
    if suite.children().is_empty() {
        write_line(indent, "pass", out);
        return;
    }
    for stmt in suite.children() {
        write_statement(stmt, indent, out);
    }
}

/// Writes a node that occupies a statement position, including blocks that
/// a rewrite may have spliced there.
fn write_body(node: &Node, indent: usize, out: &mut String) {
    match node.kind() {
        NodeKind::Suite | NodeKind::Module => write_suite(node, indent, out),
        _ => write_statement(node, indent, out),
    }
}

fn write_statement(stmt: &Node, indent: usize, out: &mut String) {
    let child = |index: usize| stmt.child(index).map(|c| c.as_ref());
    match stmt.kind() {
        NodeKind::FunctionDef => {
            let name = stmt.identifier().unwrap_or("_");
            let params = child(0).map(parameters).unwrap_or_default();
            write_line(indent, &format!("def {name}({params}):"), out);
            if let Some(body) = child(1) {
                write_body(body, indent + 1, out);
            }
        }
        NodeKind::If => write_if(stmt, indent, "if", out),
        NodeKind::While => {
            let test = child(0).map(expression).unwrap_or_default();
            write_line(indent, &format!("while {test}:"), out);
            if let Some(body) = child(1) {
                write_body(body, indent + 1, out);
            }
        }
        NodeKind::For => {
            let target = child(0).map(bare_expression).unwrap_or_default();
            let iter = child(1).map(bare_expression).unwrap_or_default();
            write_line(indent, &format!("for {target} in {iter}:"), out);
            if let Some(body) = child(2) {
                write_body(body, indent + 1, out);
            }
        }
        NodeKind::Return => match child(0) {
            Some(value) => write_line(indent, &format!("return {}", bare_expression(value)), out),
            None => write_line(indent, "return", out),
        },
        NodeKind::Assign => {
            let target = child(0).map(bare_expression).unwrap_or_default();
            let value = child(1).map(bare_expression).unwrap_or_default();
            write_line(indent, &format!("{target} = {value}"), out);
        }
        NodeKind::AugAssign => {
            let op = stmt.operator().map(Operator::symbol).unwrap_or("+");
            let target = child(0).map(bare_expression).unwrap_or_default();
            let value = child(1).map(bare_expression).unwrap_or_default();
            write_line(indent, &format!("{target} {op}= {value}"), out);
        }
        NodeKind::ExpressionStatement => {
            let value = child(0).map(bare_expression).unwrap_or_default();
            write_line(indent, &value, out);
        }
        NodeKind::Pass => write_line(indent, "pass", out),
        NodeKind::Break => write_line(indent, "break", out),
        NodeKind::Continue => write_line(indent, "continue", out),
        NodeKind::Suite | NodeKind::Module => write_suite(stmt, indent, out),
        _ => write_line(indent, &bare_expression(stmt), out),
    }
}

fn write_if(stmt: &Node, indent: usize, keyword: &str, out: &mut String) {
    let test = stmt.child(0).map(|t| expression(t)).unwrap_or_default();
    write_line(indent, &format!("{keyword} {test}:"), out);
    if let Some(body) = stmt.child(1) {
        write_body(body, indent + 1, out);
    }
    let Some(orelse) = stmt.child(2) else {
        return;
    };
    match orelse.children() {
        [only] if orelse.kind() == NodeKind::Suite && only.kind() == NodeKind::If => {
            write_if(only, indent, "elif", out)
        }
        _ => {
            write_line(indent, "else:", out);
            write_body(orelse, indent + 1, out);
        }
    }
}

fn parameters(node: &Node) -> String {
    node.children()
        .iter()
        .map(|p| bare_expression(p))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Expression in a statement-level position, where a tuple needs no parentheses.
fn bare_expression(node: &Node) -> String {
    if node.kind() == NodeKind::Tuple && node.children().len() > 1 {
        join(node.children(), 1)
    } else {
        render(node, 0)
    }
}

fn join(nodes: &[NodeRef], min: u8) -> String {
    nodes
        .iter()
        .map(|n| render(n, min))
        .collect::<Vec<_>>()
        .join(", ")
}

fn precedence(node: &Node) -> u8 {
    match node.kind() {
        NodeKind::Lambda => 1,
        NodeKind::Conditional => 2,
        NodeKind::BoolOp => match node.operator() {
            Some(Operator::Or) => 3,
            _ => 4,
        },
        NodeKind::UnaryOp => match node.operator() {
            Some(Operator::Not) => 5,
            _ => 10,
        },
        NodeKind::BinaryOp => match node.operator() {
            Some(op) if op.is_comparison() => 6,
            Some(Operator::Add | Operator::Sub) => 8,
            Some(Operator::Pow) => 11,
            _ => 9,
        },
        NodeKind::Literal => match node.literal_value() {
            Some(Literal::Int(n)) if *n < 0 => 10,
            Some(Literal::Float(x)) if x.is_sign_negative() || x.is_infinite() => 10,
            _ => 12,
        },
        _ => 12,
    }
}

fn render(node: &Node, min: u8) -> String {
    let text = render_inner(node);
    if precedence(node) < min {
        format!("({text})")
    } else {
        text
    }
}

fn render_inner(node: &Node) -> String {
    let child = |index: usize, min: u8| {
        node.child(index)
            .map(|c| render(c, min))
            .unwrap_or_default()
    };
    match node.kind() {
        NodeKind::Name => node.identifier().unwrap_or("_").to_string(),
        NodeKind::Literal => node
            .literal_value()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "None".to_string()),
        NodeKind::BinaryOp => {
            let op = node.operator().unwrap_or(Operator::Add);
            let p = precedence(node);
            let (left, right) = match op {
                Operator::Pow => (12, 10),
                _ if op.is_comparison() => (p + 1, p + 1),
                _ => (p, p + 1),
            };
            format!("{} {} {}", child(0, left), op.symbol(), child(1, right))
        }
        NodeKind::BoolOp => {
            let op = node.operator().unwrap_or(Operator::And);
            let p = precedence(node);
            format!("{} {} {}", child(0, p), op.symbol(), child(1, p + 1))
        }
        NodeKind::UnaryOp => match node.operator() {
            Some(Operator::Not) => format!("not {}", child(0, 5)),
            Some(op) => format!("{}{}", op.symbol(), child(0, 10)),
            None => child(0, 10),
        },
        NodeKind::Call => {
            let callee = child(0, 12);
            let args = node.children().get(1..).unwrap_or_default();
            format!("{callee}({})", join(args, 1))
        }
        NodeKind::Tuple => match node.children() {
            [] => "()".to_string(),
            [only] => format!("({},)", render(only, 1)),
            many => format!("({})", join(many, 1)),
        },
        NodeKind::List => format!("[{}]", join(node.children(), 1)),
        NodeKind::Subscript => format!("{}[{}]", child(0, 12), child(1, 1)),
        NodeKind::Lambda => {
            let params = node.child(0).map(|p| parameters(p)).unwrap_or_default();
            let body = child(1, 1);
            if params.is_empty() {
                format!("lambda: {body}")
            } else {
                format!("lambda {params}: {body}")
            }
        }
        NodeKind::Conditional => {
            format!("{} if {} else {}", child(0, 3), child(1, 3), child(2, 1))
        }
        NodeKind::Hole => {
            let slot = match node.label() {
                Some(Label::Slot(Some(id))) => format!("${id}"),
                _ => "$_".to_string(),
            };
            match node.child(0) {
                Some(constraint) => format!("{slot}{{{}}}", render(constraint, 0)),
                None => slot,
            }
        }
        NodeKind::Parameters => parameters(node),
        _ => node.to_source().trim_end().to_string(),
    }
}
