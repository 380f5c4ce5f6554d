// Tests for source generation from parsed trees

use pretty_assertions::assert_eq;

use super::*;
use super::source_gen::format_float;
use crate::parser::{Parser, PythonParser};

fn unparse(source: &str) -> String {
    PythonParser::new().parse(source).expect("parse").to_source()
}

#[test]
fn test_function_with_if_else() {
    let source = "\
def accumulate(combiner, base, n, term):
  if n==1:
     return base
  else:
     return combiner(term(n), accumulate(combiner, base, n-1, term))
";
    let expected = "\
def accumulate(combiner, base, n, term):
    if n == 1:
        return base
    else:
        return combiner(term(n), accumulate(combiner, base, n - 1, term))
";
    assert_eq!(unparse(source), expected);
}

#[test]
fn test_elif_chain_is_preserved() {
    let source = "if a:\n    x = 1\nelif b:\n    x = 2\nelse:\n    x = 3\n";
    assert_eq!(unparse(source), source);
}

#[test]
fn test_minimal_parentheses() {
    assert_eq!(unparse("(a + b) * c"), "(a + b) * c\n");
    assert_eq!(unparse("a + (b * c)"), "a + b * c\n");
    assert_eq!(unparse("a - (b - c)"), "a - (b - c)\n");
    assert_eq!(unparse("(a - b) - c"), "a - b - c\n");
    assert_eq!(unparse("(-2) ** 2"), "(-2) ** 2\n");
    assert_eq!(unparse("2 ** -1"), "2 ** -1\n");
    assert_eq!(unparse("(a < b) == c"), "(a < b) == c\n");
    assert_eq!(unparse("not (a and b)"), "not (a and b)\n");
    assert_eq!(unparse("(lambda x: x)(1)"), "(lambda x: x)(1)\n");
}

#[test]
fn test_tuples() {
    assert_eq!(unparse("total, k = 0, 1"), "total, k = 0, 1\n");
    assert_eq!(unparse("f((1, 2))"), "f((1, 2))\n");
    assert_eq!(unparse("x = (1,)"), "x = (1,)\n");
    assert_eq!(unparse("x = ()"), "x = ()\n");
}

#[test]
fn test_literals() {
    assert_eq!(unparse("x = 2.0"), "x = 2.0\n");
    assert_eq!(unparse("x = 0.5"), "x = 0.5\n");
    assert_eq!(unparse("x = \"it's\""), "x = 'it\\'s'\n");
    assert_eq!(unparse("x = None or True"), "x = None or True\n");
}

fn first_literal(node: &NodeRef) -> Option<Literal> {
    node.literal_value()
        .cloned()
        .or_else(|| node.children().iter().find_map(first_literal))
}

#[test]
fn test_large_floats_stay_floats() {
    for (source, value) in [("x = 1e16", 1e16), ("x = 1e20", 1e20), ("x = 2.5e300", 2.5e300)] {
        let parser = PythonParser::new();
        let tree = parser.parse(source).expect("parse");
        let printed = tree.to_source();
        let reparsed = parser.parse(&printed).expect("printed float should parse");
        assert_eq!(reparsed, tree, "{printed}");
        assert_eq!(first_literal(&reparsed), Some(Literal::Float(value)));
    }
    assert_eq!(format_float(1e20), "1e20");
    assert_eq!(format_float(3.0), "3.0");
    assert_eq!(format_float(1e-7), "1e-7");
}

#[test]
fn test_loops_and_augmented_assignment() {
    let source = "\
def product(n, term):
    total, k = 1, 1
    while k <= n:
        total *= term(k)
        k += 1
    for i in range(3):
        if i == 2:
            break
        continue
    return total
";
    assert_eq!(unparse(source), source);
}

#[test]
fn test_empty_suite_prints_pass() {
    let suite = Node::branch(NodeKind::Suite, vec![]);
    let body = Node::branch(NodeKind::While, vec![Node::name("x"), suite]);
    assert_eq!(body.to_source(), "while x:\n    pass\n");
}

#[test]
fn test_holes_print_as_metavariables() {
    let pattern = PythonParser::patterns()
        .parse("n == $1{1} and $_")
        .expect("pattern");
    assert_eq!(pattern.to_source(), "n == $1{1} and $_\n");
}

#[test]
fn test_display_of_expression_and_statement() {
    let module = PythonParser::new().parse("y = x * 2").expect("parse");
    let stmt = &module.children()[0];
    assert_eq!(stmt.to_string(), "y = x * 2");
    assert_eq!(stmt.children()[1].to_string(), "x * 2");
}
