// Tests for the interpreter

use pretty_assertions::assert_eq;

use super::*;

fn eval(source: &str) -> Value {
    Interpreter::new()
        .evaluate(source, &ExecutionLimits::default())
        .unwrap_or_else(|e| panic!("evaluation of {source:?} failed: {e}"))
        .value
}

fn eval_err(source: &str) -> ExecutionError {
    match Interpreter::new().evaluate(source, &ExecutionLimits::default()) {
        Ok(execution) => panic!("expected failure, got {:?}", execution.value),
        Err(e) => e,
    }
}

const TEST_SETUP: &str = "\
def square(x):
    return x * x

def identity(x):
    return x
";

#[test]
fn test_run_python_method() {
    let source = format!("{TEST_SETUP}\nidentity(2)");
    assert_eq!(eval(&source), Value::Int(2));
}

#[test]
fn test_result_is_last_expression_statement() {
    assert_eq!(eval("1\n2\nx = 3"), Value::Int(2));
    assert_eq!(eval("x = 3"), Value::None);
}

#[test]
fn test_product_with_while_loop() {
    let source = format!(
        "{TEST_SETUP}
def product(n, term):
    total, k = 1, 1
    while k <= n:
        total, k = total * term(k), k + 1
    return total

product(4, square)"
    );
    assert_eq!(eval(&source), Value::Int(576));
}

#[test]
fn test_recursion_and_closures() {
    let source = "\
def accumulate(combiner, base, n, term):
    if n == 0:
        return base
    return combiner(term(n), accumulate(combiner, base, n - 1, term))

def make_adder(k):
    return lambda x: x + k

add3 = make_adder(3)
accumulate(lambda a, b: a + b, 0, 5, add3)";
    assert_eq!(eval(source), Value::Int(30));
}

#[test]
fn test_python_division_semantics() {
    assert_eq!(eval("-7 // 2"), Value::Int(-4));
    assert_eq!(eval("-7 % 3"), Value::Int(2));
    assert_eq!(eval("7 % -3"), Value::Int(-2));
    assert_eq!(eval("7 / 2"), Value::Float(3.5));
    assert_eq!(eval("2 ** -1"), Value::Float(0.5));
    assert_eq!(eval("-7.5 // 2"), Value::Float(-4.0));
}

#[test]
fn test_boolean_operators_return_operands() {
    assert_eq!(eval("0 or 'x'"), Value::Str("x".into()));
    assert_eq!(eval("[] and 1"), Value::List(vec![]));
    assert_eq!(eval("not None"), Value::Bool(true));
    assert_eq!(eval("1 if 2 > 3 else 4"), Value::Int(4));
}

#[test]
fn test_collections_and_builtins() {
    assert_eq!(
        eval("xs = [3, 1, 2]\nxs[0] = 5\n(len(xs), min(xs), max(4, 9), sum(xs), xs[-1])"),
        Value::Tuple(vec![
            Value::Int(3),
            Value::Int(1),
            Value::Int(9),
            Value::Int(8),
            Value::Int(2),
        ])
    );
    assert_eq!(eval("list(range(1, 10, 4))"), Value::List(vec![Value::Int(1), Value::Int(5), Value::Int(9)]));
    assert_eq!(eval("2 in (1, 2) and 'b' in 'abc' and 5 not in range(5)"), Value::Bool(true));
    assert_eq!(eval("str(12) + str(1.0)"), Value::Str("121.0".into()));
    assert_eq!(eval("int('42') + int(3.9) + abs(-2)"), Value::Int(47));
    assert_eq!(eval("'ab' * 2"), Value::Str("abab".into()));
}

#[test]
fn test_for_loop_with_break_and_continue() {
    let source = "\
total = 0
for i in range(10):
    if i % 2 == 0:
        continue
    if i > 7:
        break
    total += i
total";
    assert_eq!(eval(source), Value::Int(16));
}

#[test]
fn test_tuple_unpacking_in_for() {
    assert_eq!(eval("s = 0\nfor a, b in [(1, 2), (3, 4)]:\n    s += a * b\ns"), Value::Int(14));
}

#[test]
fn test_print_output_is_captured() {
    let execution = Interpreter::new()
        .evaluate("print('hi', 1)\nprint([1, 'a'])", &ExecutionLimits::default())
        .unwrap();
    assert_eq!(execution.output, vec!["hi 1".to_string(), "[1, 'a']".to_string()]);
    assert_eq!(execution.value, Value::None);
}

#[test]
fn test_runtime_errors() {
    assert!(matches!(
        eval_err("1 / 0"),
        ExecutionError::Runtime(EvaluatorError::DivisionByZero)
    ));
    assert!(matches!(
        eval_err("undefined_name"),
        ExecutionError::Runtime(EvaluatorError::NameNotFound { .. })
    ));
    assert!(matches!(
        eval_err("1 + 'a'"),
        ExecutionError::Runtime(EvaluatorError::BinaryTypeError { .. })
    ));
    assert!(matches!(
        eval_err("[1][3]"),
        ExecutionError::Runtime(EvaluatorError::IndexError { .. })
    ));
    assert!(matches!(
        eval_err("9223372036854775807 + 1"),
        ExecutionError::Runtime(EvaluatorError::Overflow { .. })
    ));
    assert!(matches!(eval_err("x = ("), ExecutionError::Parse(_)));
}

#[test]
fn test_infinite_loop_hits_step_budget() {
    let limits = ExecutionLimits::default().with_max_steps(10_000);
    let err = Interpreter::new().evaluate("while True:\n    pass", &limits).unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::Runtime(EvaluatorError::StepLimit { limit: 10_000 })
    ));
}

#[test]
fn test_infinite_loop_hits_deadline() {
    let limits = ExecutionLimits::default()
        .with_timeout_ms(50)
        .with_max_steps(u64::MAX);
    let err = Interpreter::new().evaluate("while True:\n    pass", &limits).unwrap_err();
    assert!(err.is_timeout(), "unexpected error: {err}");
}

#[test]
fn test_unbounded_recursion_hits_depth_limit() {
    let limits = ExecutionLimits::default().with_max_depth(50);
    let err = Interpreter::new()
        .evaluate("def f(n):\n    return f(n + 1)\nf(0)", &limits)
        .unwrap_err();
    assert!(matches!(
        err,
        ExecutionError::Runtime(EvaluatorError::RecursionLimit { limit: 50 })
    ));
}

#[test]
fn test_unparsed_program_behaves_the_same() {
    let source = format!(
        "{TEST_SETUP}
def product(n, term):
    total, k = 1, 1
    while k <= n:
        total, k = total * term(k), k + 1
    return total
"
    );
    let module = PythonParser::new().parse(&source).unwrap();
    let regenerated = crate::ast::ToSource::to_source(&module);
    for input in ["product(3, identity)", "product(5, identity)", "product(3, square)"] {
        assert_eq!(
            eval(&format!("{source}\n{input}")),
            eval(&format!("{regenerated}\n{input}"))
        );
    }
}

#[test]
fn test_executor_trait_returns_value() {
    let executor: &dyn Executor = &Interpreter::new();
    let value = executor
        .execute("(1, [2.5, None])", &ExecutionLimits::default())
        .unwrap();
    assert_eq!(
        value,
        Value::Tuple(vec![Value::Int(1), Value::List(vec![Value::Float(2.5), Value::None])])
    );
    assert_eq!(executor.name(), "interpreter");
}
