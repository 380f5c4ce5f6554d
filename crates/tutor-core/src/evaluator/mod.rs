// Tree-walking interpreter for the Python subset.
//
// A run owns all of its state: scopes live in an index arena, lists are
// `Rc<RefCell<_>>`, and only a plain `Value` leaves the run. Runs are bounded
// by the step, depth and deadline limits in `ExecutionLimits`.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::RecvTimeoutError;
use thiserror::Error;
use tracing::{debug, warn};

use crate::ast::{Literal, Node, NodeKind, NodeRef, Operator};
use crate::parser::{ParseError, Parser, PythonParser};
use crate::security::ExecutionLimits;

mod builtins;
pub mod errors;
pub mod value;

#[cfg(test)]
mod tests;

pub use errors::EvaluatorError;
pub use value::Value;

use value::{range_iter, range_len, Body, Builtin, Function, Object, ScopeId, MAX_SEQUENCE_LEN};

pub type EvalResult<T> = Result<T, EvaluatorError>;

/// Extra time given to a worker past its own deadline before it is abandoned.
const WORKER_GRACE: Duration = Duration::from_millis(250);

/// Steps between wall-clock checks.
const DEADLINE_CHECK_INTERVAL: u64 = 256;

const GLOBAL_SCOPE: ScopeId = 0;

/// Why running a program produced no value
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Runtime(#[from] EvaluatorError),

    #[error("execution did not finish within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("execution worker failed: {0}")]
    WorkerLost(String),
}

impl ExecutionError {
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ExecutionError::Timeout { .. } | ExecutionError::Runtime(EvaluatorError::Timeout { .. })
        )
    }
}

/// Runs program text and reports the value it produces.
pub trait Executor: Send + Sync {
    fn execute(&self, source: &str, limits: &ExecutionLimits) -> Result<Value, ExecutionError>;

    /// Get executor name for debugging
    fn name(&self) -> &'static str;
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    /// Value of the last top-level expression statement, `None` if there was none
    pub value: Value,
    /// Lines written by `print`
    pub output: Vec<String>,
    pub steps: u64,
}

#[derive(Debug, Clone, Default)]
pub struct Interpreter {
    parser: PythonParser,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a parsed module on the calling thread.
    pub fn run(&self, module: &Node, limits: &ExecutionLimits) -> EvalResult<Execution> {
        Machine::new(limits).run_module(module)
    }

    /// Parse and run `source` on a dedicated worker thread with the
    /// configured stack size, abandoning it if it overruns the deadline.
    pub fn evaluate(&self, source: &str, limits: &ExecutionLimits) -> Result<Execution, ExecutionError> {
        let module = self.parser.parse(source)?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        let worker_limits = limits.clone();
        thread::Builder::new()
            .name("tutor-exec".to_string())
            .stack_size(limits.stack_size_bytes)
            .spawn(move || {
                let result = Machine::new(&worker_limits).run_module(&module);
                let _ = tx.send(result);
            })
            .map_err(|e| ExecutionError::WorkerLost(e.to_string()))?;

        match rx.recv_timeout(limits.timeout() + WORKER_GRACE) {
            Ok(result) => Ok(result?),
            Err(RecvTimeoutError::Timeout) => {
                warn!(timeout_ms = limits.timeout_ms, "execution worker overran its deadline, abandoning it");
                Err(ExecutionError::Timeout {
                    timeout_ms: limits.timeout_ms,
                })
            }
            Err(RecvTimeoutError::Disconnected) => Err(ExecutionError::WorkerLost(
                "worker exited without a result".to_string(),
            )),
        }
    }
}

impl Executor for Interpreter {
    fn execute(&self, source: &str, limits: &ExecutionLimits) -> Result<Value, ExecutionError> {
        self.evaluate(source, limits).map(|execution| execution.value)
    }

    fn name(&self) -> &'static str {
        "interpreter"
    }
}

struct Scope {
    vars: HashMap<String, Object>,
    parent: Option<ScopeId>,
    /// Set once a function or lambda closes over this scope.
    captured: bool,
}

enum Flow {
    Normal,
    Return(Object),
    Break,
    Continue,
}

pub(crate) struct Machine<'a> {
    limits: &'a ExecutionLimits,
    deadline: Instant,
    steps: u64,
    depth: usize,
    scopes: Vec<Scope>,
    output: Vec<String>,
}

fn part(node: &Node, index: usize) -> EvalResult<&NodeRef> {
    node.child(index).ok_or_else(|| {
        EvaluatorError::invalid_operation(format!("malformed {} node", node.kind()))
    })
}

fn parameter_names(params: &Node) -> EvalResult<Vec<String>> {
    params
        .children()
        .iter()
        .map(|p| {
            p.identifier()
                .map(str::to_string)
                .ok_or_else(|| EvaluatorError::invalid_operation("parameters must be names"))
        })
        .collect()
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let index = if index < 0 { index + len } else { index };
    (0..len).contains(&index).then_some(index as usize)
}

fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    let r = a.checked_rem(b)?;
    Some(if r != 0 && ((r < 0) != (b < 0)) { q - 1 } else { q })
}

fn floor_mod(a: i64, b: i64) -> Option<i64> {
    let r = a.checked_rem(b)?;
    Some(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r })
}

impl<'a> Machine<'a> {
    fn new(limits: &'a ExecutionLimits) -> Self {
        Self {
            limits,
            deadline: Instant::now() + limits.timeout(),
            steps: 0,
            depth: 0,
            scopes: vec![Scope {
                vars: HashMap::new(),
                parent: None,
                captured: false,
            }],
            output: Vec::new(),
        }
    }

    fn run_module(mut self, module: &Node) -> EvalResult<Execution> {
        let mut last = Object::None;
        for stmt in module.children() {
            if stmt.kind() == NodeKind::ExpressionStatement {
                self.tick()?;
                last = self.eval(part(stmt, 0)?, GLOBAL_SCOPE)?;
                continue;
            }
            match self.exec(stmt, GLOBAL_SCOPE)? {
                Flow::Normal => {}
                Flow::Return(_) => return Err(EvaluatorError::invalid_operation("'return' outside function")),
                Flow::Break | Flow::Continue => {
                    return Err(EvaluatorError::invalid_operation("'break' or 'continue' outside loop"))
                }
            }
        }
        debug!(steps = self.steps, "run finished");
        Ok(Execution {
            value: last.to_value()?,
            output: self.output,
            steps: self.steps,
        })
    }

    fn tick(&mut self) -> EvalResult<()> {
        self.steps += 1;
        if self.steps > self.limits.max_steps {
            return Err(EvaluatorError::StepLimit {
                limit: self.limits.max_steps,
            });
        }
        if self.steps % DEADLINE_CHECK_INTERVAL == 0 && Instant::now() >= self.deadline {
            return Err(EvaluatorError::Timeout {
                timeout_ms: self.limits.timeout_ms,
            });
        }
        Ok(())
    }

    // --- Statements ---

    fn exec_block(&mut self, block: &Node, scope: ScopeId) -> EvalResult<Flow> {
        for stmt in block.children() {
            match self.exec(stmt, scope)? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    fn exec(&mut self, stmt: &Node, scope: ScopeId) -> EvalResult<Flow> {
        self.tick()?;
        match stmt.kind() {
            NodeKind::FunctionDef => {
                let name = stmt
                    .identifier()
                    .ok_or_else(|| EvaluatorError::invalid_operation("function without a name"))?;
                let function = Function {
                    name: name.to_string(),
                    params: parameter_names(part(stmt, 0)?)?,
                    body: Body::Block(part(stmt, 1)?.clone()),
                    scope,
                };
                self.scopes[scope].captured = true;
                self.scopes[scope]
                    .vars
                    .insert(name.to_string(), Object::Function(Rc::new(function)));
                Ok(Flow::Normal)
            }
            NodeKind::If => {
                if self.eval(part(stmt, 0)?, scope)?.truthy() {
                    self.exec_block(part(stmt, 1)?, scope)
                } else if let Some(orelse) = stmt.child(2) {
                    self.exec_block(orelse, scope)
                } else {
                    Ok(Flow::Normal)
                }
            }
            NodeKind::While => {
                let (test, body) = (part(stmt, 0)?, part(stmt, 1)?);
                while self.eval(test, scope)?.truthy() {
                    match self.exec_block(body, scope)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => {}
                    }
                }
                Ok(Flow::Normal)
            }
            NodeKind::For => self.exec_for(stmt, scope),
            NodeKind::Return => {
                let value = match stmt.child(0) {
                    Some(expr) => self.eval(expr, scope)?,
                    None => Object::None,
                };
                Ok(Flow::Return(value))
            }
            NodeKind::Assign => {
                let value = self.eval(part(stmt, 1)?, scope)?;
                self.assign(part(stmt, 0)?, value, scope)?;
                Ok(Flow::Normal)
            }
            NodeKind::AugAssign => {
                let op = stmt
                    .operator()
                    .ok_or_else(|| EvaluatorError::invalid_operation("augmented assignment without operator"))?;
                let target = part(stmt, 0)?;
                let current = self.eval(target, scope)?;
                let operand = self.eval(part(stmt, 1)?, scope)?;
                if let (Operator::Add, Object::List(items)) = (op, &current) {
                    let extra = self.elements(&operand)?;
                    items.borrow_mut().extend(extra);
                    return Ok(Flow::Normal);
                }
                let result = self.binary(op, current, operand)?;
                self.assign(target, result, scope)?;
                Ok(Flow::Normal)
            }
            NodeKind::ExpressionStatement => {
                self.eval(part(stmt, 0)?, scope)?;
                Ok(Flow::Normal)
            }
            NodeKind::Pass => Ok(Flow::Normal),
            NodeKind::Break => Ok(Flow::Break),
            NodeKind::Continue => Ok(Flow::Continue),
            NodeKind::Suite | NodeKind::Module => self.exec_block(stmt, scope),
            other => Err(EvaluatorError::invalid_operation(format!(
                "{other} is not a statement"
            ))),
        }
    }

    fn exec_for(&mut self, stmt: &Node, scope: ScopeId) -> EvalResult<Flow> {
        let (target, body) = (part(stmt, 0)?, part(stmt, 2)?);
        let iterable = self.eval(part(stmt, 1)?, scope)?;
        let items: Box<dyn Iterator<Item = Object>> = match iterable {
            Object::Range { start, stop, step } => Box::new(range_iter(start, stop, step).map(Object::Int)),
            other => Box::new(self.elements(&other)?.into_iter()),
        };
        for item in items {
            self.tick()?;
            self.assign(target, item, scope)?;
            match self.exec_block(body, scope)? {
                Flow::Break => break,
                Flow::Return(value) => return Ok(Flow::Return(value)),
                Flow::Normal | Flow::Continue => {}
            }
        }
        Ok(Flow::Normal)
    }

    fn assign(&mut self, target: &Node, value: Object, scope: ScopeId) -> EvalResult<()> {
        match target.kind() {
            NodeKind::Name => {
                let name = target
                    .identifier()
                    .ok_or_else(|| EvaluatorError::invalid_operation("name without identifier"))?;
                self.scopes[scope].vars.insert(name.to_string(), value);
                Ok(())
            }
            NodeKind::Subscript => {
                let container = self.eval(part(target, 0)?, scope)?;
                let index = self.eval(part(target, 1)?, scope)?;
                let Object::List(items) = container else {
                    return Err(EvaluatorError::unary_type_error(
                        "item assignment",
                        "list",
                        container.type_name(),
                    ));
                };
                let i = index.as_int().ok_or_else(|| {
                    EvaluatorError::unary_type_error("list index", "integer", index.type_name())
                })?;
                let mut items = items.borrow_mut();
                let slot = normalize_index(i, items.len())
                    .ok_or_else(|| EvaluatorError::index_error("list assignment index out of range"))?;
                items[slot] = value;
                Ok(())
            }
            NodeKind::Tuple | NodeKind::List => {
                let values = self.elements(&value)?;
                let targets = target.children();
                if values.len() != targets.len() {
                    return Err(EvaluatorError::value_error(format!(
                        "expected {} values to unpack, got {}",
                        targets.len(),
                        values.len()
                    )));
                }
                for (element, value) in targets.iter().zip(values) {
                    self.assign(element, value, scope)?;
                }
                Ok(())
            }
            other => Err(EvaluatorError::invalid_operation(format!(
                "cannot assign to {other}"
            ))),
        }
    }

    // --- Expressions ---

    fn lookup(&self, name: &str, scope: ScopeId) -> EvalResult<Object> {
        let mut current = Some(scope);
        while let Some(id) = current {
            if let Some(value) = self.scopes[id].vars.get(name) {
                return Ok(value.clone());
            }
            current = self.scopes[id].parent;
        }
        Builtin::lookup(name)
            .map(Object::Builtin)
            .ok_or_else(|| EvaluatorError::name_not_found(name))
    }

    fn eval(&mut self, node: &Node, scope: ScopeId) -> EvalResult<Object> {
        self.tick()?;
        match node.kind() {
            NodeKind::Name => {
                let name = node
                    .identifier()
                    .ok_or_else(|| EvaluatorError::invalid_operation("name without identifier"))?;
                self.lookup(name, scope)
            }
            NodeKind::Literal => Ok(match node.literal_value() {
                Some(Literal::Bool(b)) => Object::Bool(*b),
                Some(Literal::Int(n)) => Object::Int(*n),
                Some(Literal::Float(x)) => Object::Float(*x),
                Some(Literal::Str(s)) => Object::str(s.as_str()),
                Some(Literal::None) | None => Object::None,
            }),
            NodeKind::BinaryOp => {
                let op = node
                    .operator()
                    .ok_or_else(|| EvaluatorError::invalid_operation("binary node without operator"))?;
                let left = self.eval(part(node, 0)?, scope)?;
                let right = self.eval(part(node, 1)?, scope)?;
                self.binary(op, left, right)
            }
            NodeKind::BoolOp => {
                let left = self.eval(part(node, 0)?, scope)?;
                let short_circuit = match node.operator() {
                    Some(Operator::Or) => left.truthy(),
                    _ => !left.truthy(),
                };
                if short_circuit {
                    Ok(left)
                } else {
                    self.eval(part(node, 1)?, scope)
                }
            }
            NodeKind::UnaryOp => {
                let operand = self.eval(part(node, 0)?, scope)?;
                self.unary(node.operator().unwrap_or(Operator::Not), operand)
            }
            NodeKind::Call => {
                let callee = self.eval(part(node, 0)?, scope)?;
                let args = node.children()[1..]
                    .iter()
                    .map(|arg| self.eval(arg, scope))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.call(callee, args)
            }
            NodeKind::Tuple => Ok(Object::tuple(
                node.children()
                    .iter()
                    .map(|e| self.eval(e, scope))
                    .collect::<EvalResult<_>>()?,
            )),
            NodeKind::List => Ok(Object::list(
                node.children()
                    .iter()
                    .map(|e| self.eval(e, scope))
                    .collect::<EvalResult<_>>()?,
            )),
            NodeKind::Subscript => {
                let value = self.eval(part(node, 0)?, scope)?;
                let index = self.eval(part(node, 1)?, scope)?;
                self.index(&value, &index)
            }
            NodeKind::Lambda => {
                let function = Function {
                    name: "<lambda>".to_string(),
                    params: parameter_names(part(node, 0)?)?,
                    body: Body::Expression(part(node, 1)?.clone()),
                    scope,
                };
                self.scopes[scope].captured = true;
                Ok(Object::Function(Rc::new(function)))
            }
            NodeKind::Conditional => {
                if self.eval(part(node, 1)?, scope)?.truthy() {
                    self.eval(part(node, 0)?, scope)
                } else {
                    self.eval(part(node, 2)?, scope)
                }
            }
            NodeKind::Hole => Err(EvaluatorError::invalid_operation("unresolved metavariable")),
            other => Err(EvaluatorError::invalid_operation(format!(
                "{other} is not an expression"
            ))),
        }
    }

    fn call(&mut self, callee: Object, args: Vec<Object>) -> EvalResult<Object> {
        let function = match callee {
            Object::Builtin(builtin) => return self.call_builtin(builtin, args),
            Object::Function(function) => function,
            other => {
                return Err(EvaluatorError::invalid_operation(format!(
                    "'{}' object is not callable",
                    other.type_name()
                )))
            }
        };
        if args.len() != function.params.len() {
            return Err(EvaluatorError::arity(
                &function.name,
                function.params.len().to_string(),
                args.len(),
            ));
        }
        if self.depth >= self.limits.max_depth {
            return Err(EvaluatorError::RecursionLimit {
                limit: self.limits.max_depth,
            });
        }

        let vars = function.params.iter().cloned().zip(args).collect();
        self.scopes.push(Scope {
            vars,
            parent: Some(function.scope),
            captured: false,
        });
        let frame = self.scopes.len() - 1;
        self.depth += 1;
        let result = match &function.body {
            Body::Block(block) => match self.exec_block(block, frame) {
                Ok(Flow::Return(value)) => Ok(value),
                Ok(Flow::Normal) => Ok(Object::None),
                Ok(Flow::Break | Flow::Continue) => Err(EvaluatorError::invalid_operation(
                    "'break' or 'continue' outside loop",
                )),
                Err(e) => Err(e),
            },
            Body::Expression(expr) => self.eval(expr, frame),
        };
        self.depth -= 1;
        if !self.scopes[frame].captured && self.scopes.len() == frame + 1 {
            self.scopes.pop();
        }
        result
    }

    fn unary(&mut self, op: Operator, operand: Object) -> EvalResult<Object> {
        match op {
            Operator::Not => Ok(Object::Bool(!operand.truthy())),
            Operator::Neg | Operator::Pos => match operand {
                Object::Float(x) if op == Operator::Neg => Ok(Object::Float(-x)),
                Object::Float(x) => Ok(Object::Float(x)),
                other => {
                    let n = other.as_int().ok_or_else(|| {
                        EvaluatorError::unary_type_error(op.symbol(), "a number", other.type_name())
                    })?;
                    if op == Operator::Neg {
                        n.checked_neg()
                            .map(Object::Int)
                            .ok_or_else(|| EvaluatorError::overflow("negation"))
                    } else {
                        Ok(Object::Int(n))
                    }
                }
            },
            other => Err(EvaluatorError::invalid_operation(format!(
                "'{}' is not a unary operator",
                other.symbol()
            ))),
        }
    }

    fn binary(&mut self, op: Operator, left: Object, right: Object) -> EvalResult<Object> {
        match op {
            Operator::Add => match (&left, &right) {
                (Object::Str(a), Object::Str(b)) => {
                    if a.len() + b.len() > MAX_SEQUENCE_LEN {
                        return Err(EvaluatorError::value_error("string too large"));
                    }
                    Ok(Object::str(format!("{a}{b}")))
                }
                (Object::List(a), Object::List(b)) => {
                    let mut items = a.borrow().clone();
                    items.extend(b.borrow().iter().cloned());
                    Ok(Object::list(items))
                }
                (Object::Tuple(a), Object::Tuple(b)) => {
                    Ok(Object::tuple(a.iter().chain(b.iter()).cloned().collect()))
                }
                _ => self.arithmetic(op, &left, &right),
            },
            Operator::Mul => match (&left, &right) {
                (Object::Str(s), n) | (n, Object::Str(s)) if n.as_int().is_some() => {
                    let chars: Vec<char> = s.chars().collect();
                    let repeated = builtins::repeat(chars.as_slice(), n.as_int().unwrap_or(0))?;
                    Ok(Object::str(repeated.into_iter().collect::<String>()))
                }
                (Object::List(items), n) | (n, Object::List(items)) if n.as_int().is_some() => {
                    let items = items.borrow().clone();
                    Ok(Object::list(builtins::repeat(items.as_slice(), n.as_int().unwrap_or(0))?))
                }
                (Object::Tuple(items), n) | (n, Object::Tuple(items)) if n.as_int().is_some() => {
                    Ok(Object::tuple(builtins::repeat(items.as_slice(), n.as_int().unwrap_or(0))?))
                }
                _ => self.arithmetic(op, &left, &right),
            },
            Operator::Sub | Operator::Div | Operator::FloorDiv | Operator::Mod | Operator::Pow => {
                self.arithmetic(op, &left, &right)
            }
            Operator::Eq => Ok(Object::Bool(equals(&left, &right))),
            Operator::NotEq => Ok(Object::Bool(!equals(&left, &right))),
            Operator::Lt | Operator::LtE | Operator::Gt | Operator::GtE => {
                let ordering = self.compare(op.symbol(), &left, &right)?;
                Ok(Object::Bool(match (op, ordering) {
                    (_, None) => false,
                    (Operator::Lt, Some(o)) => o == Ordering::Less,
                    (Operator::LtE, Some(o)) => o != Ordering::Greater,
                    (Operator::Gt, Some(o)) => o == Ordering::Greater,
                    (_, Some(o)) => o != Ordering::Less,
                }))
            }
            Operator::In => Ok(Object::Bool(contains(&right, &left)?)),
            Operator::NotIn => Ok(Object::Bool(!contains(&right, &left)?)),
            Operator::Is => Ok(Object::Bool(identical(&left, &right))),
            Operator::IsNot => Ok(Object::Bool(!identical(&left, &right))),
            Operator::And | Operator::Or | Operator::Not | Operator::Neg | Operator::Pos => {
                Err(EvaluatorError::invalid_operation(format!(
                    "'{}' is not a binary operator",
                    op.symbol()
                )))
            }
        }
    }

    fn arithmetic(&self, op: Operator, left: &Object, right: &Object) -> EvalResult<Object> {
        let symbol = op.symbol();
        if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
            let overflow = || EvaluatorError::overflow(symbol);
            return match op {
                Operator::Add => a.checked_add(b).map(Object::Int).ok_or_else(overflow),
                Operator::Sub => a.checked_sub(b).map(Object::Int).ok_or_else(overflow),
                Operator::Mul => a.checked_mul(b).map(Object::Int).ok_or_else(overflow),
                _ if b == 0 && matches!(op, Operator::Div | Operator::FloorDiv | Operator::Mod) => {
                    Err(EvaluatorError::DivisionByZero)
                }
                Operator::Div => Ok(Object::Float(a as f64 / b as f64)),
                Operator::FloorDiv => floor_div(a, b).map(Object::Int).ok_or_else(overflow),
                Operator::Mod => floor_mod(a, b).map(Object::Int).ok_or_else(overflow),
                Operator::Pow if b >= 0 => u32::try_from(b)
                    .ok()
                    .and_then(|exp| a.checked_pow(exp))
                    .map(Object::Int)
                    .ok_or_else(overflow),
                Operator::Pow if a == 0 => Err(EvaluatorError::DivisionByZero),
                Operator::Pow => Ok(Object::Float((a as f64).powf(b as f64))),
                _ => Err(EvaluatorError::binary_type_error(symbol, left.type_name(), right.type_name())),
            };
        }
        let (Some(a), Some(b)) = (left.as_float(), right.as_float()) else {
            return Err(EvaluatorError::binary_type_error(
                symbol,
                left.type_name(),
                right.type_name(),
            ));
        };
        match op {
            Operator::Add => Ok(Object::Float(a + b)),
            Operator::Sub => Ok(Object::Float(a - b)),
            Operator::Mul => Ok(Object::Float(a * b)),
            Operator::Div | Operator::FloorDiv | Operator::Mod if b == 0.0 => {
                Err(EvaluatorError::DivisionByZero)
            }
            Operator::Div => Ok(Object::Float(a / b)),
            Operator::FloorDiv => Ok(Object::Float((a / b).floor())),
            Operator::Mod => {
                let r = a % b;
                Ok(Object::Float(if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }))
            }
            Operator::Pow if a == 0.0 && b < 0.0 => Err(EvaluatorError::DivisionByZero),
            Operator::Pow => Ok(Object::Float(a.powf(b))),
            _ => Err(EvaluatorError::binary_type_error(symbol, left.type_name(), right.type_name())),
        }
    }

    /// Ordering between two values; `None` when they are unordered (NaN).
    fn compare(&self, operation: &str, left: &Object, right: &Object) -> EvalResult<Option<Ordering>> {
        if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
            return Ok(Some(a.cmp(&b)));
        }
        if left.is_number() && right.is_number() {
            let (a, b) = (left.as_float().unwrap_or(0.0), right.as_float().unwrap_or(0.0));
            return Ok(a.partial_cmp(&b));
        }
        match (left, right) {
            (Object::Str(a), Object::Str(b)) => Ok(Some(a.cmp(b))),
            (Object::List(a), Object::List(b)) => {
                let (a, b) = (a.borrow().clone(), b.borrow().clone());
                self.compare_sequences(operation, &a, &b)
            }
            (Object::Tuple(a), Object::Tuple(b)) => self.compare_sequences(operation, a, b),
            _ => Err(EvaluatorError::binary_type_error(
                operation,
                left.type_name(),
                right.type_name(),
            )),
        }
    }

    fn compare_sequences(&self, operation: &str, a: &[Object], b: &[Object]) -> EvalResult<Option<Ordering>> {
        for (x, y) in a.iter().zip(b) {
            if !equals(x, y) {
                return self.compare(operation, x, y);
            }
        }
        Ok(Some(a.len().cmp(&b.len())))
    }

    fn index(&self, value: &Object, index: &Object) -> EvalResult<Object> {
        let i = index.as_int().ok_or_else(|| {
            EvaluatorError::unary_type_error("indexing", "an integer index", index.type_name())
        })?;
        let out_of_range = || EvaluatorError::index_error(format!("{} index {i}", value.type_name()));
        match value {
            Object::List(items) => {
                let items = items.borrow();
                normalize_index(i, items.len())
                    .map(|slot| items[slot].clone())
                    .ok_or_else(out_of_range)
            }
            Object::Tuple(items) => normalize_index(i, items.len())
                .map(|slot| items[slot].clone())
                .ok_or_else(out_of_range),
            Object::Str(s) => {
                let chars: Vec<char> = s.chars().collect();
                normalize_index(i, chars.len())
                    .map(|slot| Object::str(chars[slot].to_string()))
                    .ok_or_else(out_of_range)
            }
            Object::Range { start, stop, step } => {
                let len = usize::try_from(range_len(*start, *stop, *step)).unwrap_or(usize::MAX);
                normalize_index(i, len)
                    .map(|slot| Object::Int(start + slot as i64 * step))
                    .ok_or_else(out_of_range)
            }
            other => Err(EvaluatorError::unary_type_error(
                "indexing",
                "a sequence",
                other.type_name(),
            )),
        }
    }

    /// Materialize the elements of an iterable.
    fn elements(&mut self, value: &Object) -> EvalResult<Vec<Object>> {
        match value {
            Object::List(items) => Ok(items.borrow().clone()),
            Object::Tuple(items) => Ok(items.as_ref().clone()),
            Object::Str(s) => Ok(s.chars().map(|c| Object::str(c.to_string())).collect()),
            Object::Range { start, stop, step } => {
                if range_len(*start, *stop, *step) > MAX_SEQUENCE_LEN as i64 {
                    return Err(EvaluatorError::value_error("range too large to materialize"));
                }
                range_iter(*start, *stop, *step)
                    .map(|n| self.tick().map(|_| Object::Int(n)))
                    .collect()
            }
            other => Err(EvaluatorError::unary_type_error(
                "iteration",
                "an iterable",
                other.type_name(),
            )),
        }
    }
}

fn equals(left: &Object, right: &Object) -> bool {
    if let (Some(a), Some(b)) = (left.as_int(), right.as_int()) {
        return a == b;
    }
    if left.is_number() && right.is_number() {
        return left.as_float() == right.as_float();
    }
    match (left, right) {
        (Object::None, Object::None) => true,
        (Object::Str(a), Object::Str(b)) => a == b,
        (Object::List(a), Object::List(b)) => {
            Rc::ptr_eq(a, b) || {
                let (a, b) = (a.borrow(), b.borrow());
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| equals(x, y))
            }
        }
        (Object::Tuple(a), Object::Tuple(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| equals(x, y))
        }
        (
            Object::Range { start, stop, step },
            Object::Range {
                start: s2,
                stop: e2,
                step: st2,
            },
        ) => (start, stop, step) == (s2, e2, st2),
        (Object::Function(a), Object::Function(b)) => Rc::ptr_eq(a, b),
        (Object::Builtin(a), Object::Builtin(b)) => a == b,
        _ => false,
    }
}

fn identical(left: &Object, right: &Object) -> bool {
    match (left, right) {
        (Object::List(a), Object::List(b)) => Rc::ptr_eq(a, b),
        (Object::Tuple(a), Object::Tuple(b)) => Rc::ptr_eq(a, b),
        (Object::Bool(a), Object::Bool(b)) => a == b,
        (Object::Bool(_), _) | (_, Object::Bool(_)) => false,
        _ => equals(left, right),
    }
}

fn contains(container: &Object, item: &Object) -> EvalResult<bool> {
    match container {
        Object::Str(haystack) => match item {
            Object::Str(needle) => Ok(haystack.contains(&**needle)),
            other => Err(EvaluatorError::binary_type_error("in", other.type_name(), "str")),
        },
        Object::List(items) => Ok(items.borrow().iter().any(|x| equals(x, item))),
        Object::Tuple(items) => Ok(items.iter().any(|x| equals(x, item))),
        Object::Range { start, stop, step } => {
            let Some(n) = item.as_int() else {
                return Ok(false);
            };
            let within = if *step > 0 {
                *start <= n && n < *stop
            } else {
                *stop < n && n <= *start
            };
            Ok(within && (i128::from(n) - i128::from(*start)) % i128::from(*step) == 0)
        }
        other => Err(EvaluatorError::unary_type_error(
            "membership test",
            "an iterable",
            other.type_name(),
        )),
    }
}
