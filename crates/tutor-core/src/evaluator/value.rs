use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use super::errors::EvaluatorError;
use crate::ast::source_gen::{format_float, quote_string};
use crate::ast::NodeRef;

/// Result of running a program, detached from the interpreter that made it.
///
/// Oracle files describe expected values in JSON, so a `Value` converts
/// to and from `serde_json` values. JSON arrays read back as lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Tuple(Vec<Value>),
    Function(String),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Tuple(_) => "tuple",
            Value::Function(_) => "function",
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            Value::Bool(b) => Some(f64::from(u8::from(*b))),
            Value::Int(n) => Some(*n as f64),
            Value::Float(x) => Some(*x),
            _ => None,
        }
    }

    /// Equality the way the program under test would see it: numbers compare
    /// by value across int, float and bool, and lists and tuples with equal
    /// elements are interchangeable.
    pub fn equivalent(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::None, Value::None) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a == b,
            (
                Value::List(a) | Value::Tuple(a),
                Value::List(b) | Value::Tuple(b),
            ) => a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equivalent(y)),
            _ => match (self.as_number(), other.as_number()) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            },
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Option<Value> {
        Some(match json {
            serde_json::Value::Null => Value::None,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64()?),
            },
            serde_json::Value::String(s) => Value::Str(s.clone()),
            serde_json::Value::Array(items) => {
                Value::List(items.iter().map(Value::from_json).collect::<Option<_>>()?)
            }
            serde_json::Value::Object(_) => return None,
        })
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Bool(true) => write!(f, "True"),
            Value::Bool(false) => write!(f, "False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{}", quote_string(s)),
            Value::List(items) => write!(f, "[{}]", join(items)),
            Value::Tuple(items) if items.len() == 1 => write!(f, "({},)", items[0]),
            Value::Tuple(items) => write!(f, "({})", join(items)),
            Value::Function(name) => write!(f, "<function {name}>"),
        }
    }
}

fn join(items: &[Value]) -> String {
    items
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Index of a scope in the interpreter's scope arena.
pub(crate) type ScopeId = usize;

/// Longest sequence a single operation may build.
pub(crate) const MAX_SEQUENCE_LEN: usize = 10_000_000;

/// Deepest container nesting converted back to a `Value`.
const MAX_NESTING: usize = 200;

#[derive(Debug)]
pub(crate) enum Body {
    Block(NodeRef),
    Expression(NodeRef),
}

#[derive(Debug)]
pub(crate) struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub body: Body,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Builtin {
    Print,
    Len,
    Abs,
    Min,
    Max,
    Range,
    Sum,
    Int,
    Float,
    Str,
    Bool,
    List,
    Tuple,
}

/// Interpreter-internal value. Lists are shared and mutable; everything
/// else is immutable.
#[derive(Debug, Clone)]
pub(crate) enum Object {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    List(Rc<RefCell<Vec<Object>>>),
    Tuple(Rc<Vec<Object>>),
    Range { start: i64, stop: i64, step: i64 },
    Function(Rc<Function>),
    Builtin(Builtin),
}

impl Object {
    pub fn str(value: impl Into<Rc<str>>) -> Self {
        Object::Str(value.into())
    }

    pub fn list(items: Vec<Object>) -> Self {
        Object::List(Rc::new(RefCell::new(items)))
    }

    pub fn tuple(items: Vec<Object>) -> Self {
        Object::Tuple(Rc::new(items))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Object::None => "NoneType",
            Object::Bool(_) => "bool",
            Object::Int(_) => "int",
            Object::Float(_) => "float",
            Object::Str(_) => "str",
            Object::List(_) => "list",
            Object::Tuple(_) => "tuple",
            Object::Range { .. } => "range",
            Object::Function(_) => "function",
            Object::Builtin(_) => "builtin_function",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Object::None => false,
            Object::Bool(b) => *b,
            Object::Int(n) => *n != 0,
            Object::Float(x) => *x != 0.0,
            Object::Str(s) => !s.is_empty(),
            Object::List(items) => !items.borrow().is_empty(),
            Object::Tuple(items) => !items.is_empty(),
            Object::Range { start, stop, step } => range_len(*start, *stop, *step) > 0,
            Object::Function(_) | Object::Builtin(_) => true,
        }
    }

    /// Integer view used by arithmetic; bools count as 0 and 1.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Object::Bool(b) => Some(i64::from(*b)),
            Object::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Object::Float(x) => Some(*x),
            other => other.as_int().map(|n| n as f64),
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Object::Bool(_) | Object::Int(_) | Object::Float(_))
    }

    pub fn to_value(&self) -> Result<Value, EvaluatorError> {
        self.to_value_at(0)
    }

    fn to_value_at(&self, nesting: usize) -> Result<Value, EvaluatorError> {
        if nesting > MAX_NESTING {
            return Err(EvaluatorError::value_error("value is nested too deeply to return"));
        }
        let convert = |item: &Object| item.to_value_at(nesting + 1);
        Ok(match self {
            Object::None => Value::None,
            Object::Bool(b) => Value::Bool(*b),
            Object::Int(n) => Value::Int(*n),
            Object::Float(x) => Value::Float(*x),
            Object::Str(s) => Value::Str(s.to_string()),
            Object::List(items) => Value::List(
                items
                    .borrow()
                    .iter()
                    .map(convert)
                    .collect::<Result<_, _>>()?,
            ),
            Object::Tuple(items) => {
                Value::Tuple(items.iter().map(convert).collect::<Result<_, _>>()?)
            }
            Object::Range { start, stop, step } => {
                if range_len(*start, *stop, *step) > MAX_SEQUENCE_LEN as i64 {
                    return Err(EvaluatorError::value_error("range too large to convert"));
                }
                Value::List(
                    range_iter(*start, *stop, *step)
                        .map(Value::Int)
                        .collect(),
                )
            }
            Object::Function(function) => Value::Function(function.name.clone()),
            Object::Builtin(builtin) => Value::Function(builtin.name().to_string()),
        })
    }
}

impl Builtin {
    pub fn lookup(name: &str) -> Option<Self> {
        Some(match name {
            "print" => Builtin::Print,
            "len" => Builtin::Len,
            "abs" => Builtin::Abs,
            "min" => Builtin::Min,
            "max" => Builtin::Max,
            "range" => Builtin::Range,
            "sum" => Builtin::Sum,
            "int" => Builtin::Int,
            "float" => Builtin::Float,
            "str" => Builtin::Str,
            "bool" => Builtin::Bool,
            "list" => Builtin::List,
            "tuple" => Builtin::Tuple,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Builtin::Print => "print",
            Builtin::Len => "len",
            Builtin::Abs => "abs",
            Builtin::Min => "min",
            Builtin::Max => "max",
            Builtin::Range => "range",
            Builtin::Sum => "sum",
            Builtin::Int => "int",
            Builtin::Float => "float",
            Builtin::Str => "str",
            Builtin::Bool => "bool",
            Builtin::List => "list",
            Builtin::Tuple => "tuple",
        }
    }
}

pub(crate) fn range_len(start: i64, stop: i64, step: i64) -> i64 {
    let (span, step) = if step > 0 {
        (i128::from(stop) - i128::from(start), i128::from(step))
    } else {
        (i128::from(start) - i128::from(stop), -i128::from(step))
    };
    if span <= 0 || step == 0 {
        0
    } else {
        i64::try_from((span + step - 1) / step).unwrap_or(i64::MAX)
    }
}

pub(crate) fn range_iter(start: i64, stop: i64, step: i64) -> impl Iterator<Item = i64> {
    let len = range_len(start, stop, step);
    (0..len).map(move |i| start.wrapping_add(i.wrapping_mul(step)))
}
