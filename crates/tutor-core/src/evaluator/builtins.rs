// Builtin functions available to every program

use std::cmp::Ordering;

use tracing::trace;

use super::errors::EvaluatorError;
use super::value::{range_len, Builtin, Object, MAX_SEQUENCE_LEN};
use super::{EvalResult, Machine};
use crate::ast::source_gen::{format_float, quote_string};
use crate::ast::Operator;

/// Deepest container nesting that `repr` will print.
const MAX_REPR_NESTING: usize = 200;

impl Machine<'_> {
    pub(super) fn call_builtin(&mut self, builtin: Builtin, args: Vec<Object>) -> EvalResult<Object> {
        let name = builtin.name();
        match builtin {
            Builtin::Print => {
                let line = args.iter().map(display).collect::<EvalResult<Vec<_>>>()?.join(" ");
                trace!(output = %line, "print");
                self.output.push(line);
                Ok(Object::None)
            }
            Builtin::Len => {
                let [value] = exactly::<1>(name, args)?;
                let len = match &value {
                    Object::Str(s) => s.chars().count() as i64,
                    Object::List(items) => items.borrow().len() as i64,
                    Object::Tuple(items) => items.len() as i64,
                    Object::Range { start, stop, step } => range_len(*start, *stop, *step),
                    other => {
                        return Err(EvaluatorError::unary_type_error(
                            name,
                            "a sized object",
                            other.type_name(),
                        ))
                    }
                };
                Ok(Object::Int(len))
            }
            Builtin::Abs => {
                let [value] = exactly::<1>(name, args)?;
                match value {
                    Object::Float(x) => Ok(Object::Float(x.abs())),
                    other => match other.as_int() {
                        Some(n) => n
                            .checked_abs()
                            .map(Object::Int)
                            .ok_or_else(|| EvaluatorError::overflow(name)),
                        None => Err(EvaluatorError::unary_type_error(name, "a number", other.type_name())),
                    },
                }
            }
            Builtin::Min | Builtin::Max => {
                let candidates = match args.len() {
                    0 => return Err(EvaluatorError::arity(name, "at least 1", 0)),
                    1 => self.elements(&args[0])?,
                    _ => args,
                };
                let wanted = if builtin == Builtin::Min {
                    Ordering::Less
                } else {
                    Ordering::Greater
                };
                let mut items = candidates.into_iter();
                let mut best = items.next().ok_or_else(|| {
                    EvaluatorError::value_error(format!("{name}() arg is an empty sequence"))
                })?;
                for item in items {
                    if self.compare(name, &item, &best)? == Some(wanted) {
                        best = item;
                    }
                }
                Ok(best)
            }
            Builtin::Range => {
                let ints = args
                    .iter()
                    .map(|a| {
                        a.as_int().ok_or_else(|| {
                            EvaluatorError::unary_type_error(name, "integer arguments", a.type_name())
                        })
                    })
                    .collect::<EvalResult<Vec<_>>>()?;
                let (start, stop, step) = match ints[..] {
                    [stop] => (0, stop, 1),
                    [start, stop] => (start, stop, 1),
                    [start, stop, step] => (start, stop, step),
                    _ => return Err(EvaluatorError::arity(name, "1 to 3", ints.len())),
                };
                if step == 0 {
                    return Err(EvaluatorError::value_error("range() arg 3 must not be zero"));
                }
                Ok(Object::Range { start, stop, step })
            }
            Builtin::Sum => {
                let (iterable, start) = match args.len() {
                    1 => (args[0].clone(), Object::Int(0)),
                    2 => (args[0].clone(), args[1].clone()),
                    n => return Err(EvaluatorError::arity(name, "1 or 2", n)),
                };
                let mut total = start;
                for item in self.elements(&iterable)? {
                    total = self.binary(Operator::Add, total, item)?;
                }
                Ok(total)
            }
            Builtin::Int => match optional(name, args)? {
                None => Ok(Object::Int(0)),
                Some(Object::Float(x)) => {
                    if !x.is_finite() || x.trunc().abs() >= 9.2e18 {
                        return Err(EvaluatorError::overflow(name));
                    }
                    Ok(Object::Int(x.trunc() as i64))
                }
                Some(Object::Str(s)) => s.trim().parse().map(Object::Int).map_err(|_| {
                    EvaluatorError::value_error(format!("invalid literal for int(): {}", quote_string(&s)))
                }),
                Some(other) => other
                    .as_int()
                    .map(Object::Int)
                    .ok_or_else(|| EvaluatorError::unary_type_error(name, "a number or string", other.type_name())),
            },
            Builtin::Float => match optional(name, args)? {
                None => Ok(Object::Float(0.0)),
                Some(Object::Str(s)) => s.trim().parse().map(Object::Float).map_err(|_| {
                    EvaluatorError::value_error(format!(
                        "could not convert string to float: {}",
                        quote_string(&s)
                    ))
                }),
                Some(other) => other
                    .as_float()
                    .map(Object::Float)
                    .ok_or_else(|| EvaluatorError::unary_type_error(name, "a number or string", other.type_name())),
            },
            Builtin::Str => match optional(name, args)? {
                None => Ok(Object::str("")),
                Some(value) => Ok(Object::str(display(&value)?)),
            },
            Builtin::Bool => Ok(Object::Bool(
                optional(name, args)?.is_some_and(|v| v.truthy()),
            )),
            Builtin::List => match optional(name, args)? {
                None => Ok(Object::list(Vec::new())),
                Some(value) => Ok(Object::list(self.elements(&value)?)),
            },
            Builtin::Tuple => match optional(name, args)? {
                None => Ok(Object::tuple(Vec::new())),
                Some(value) => Ok(Object::tuple(self.elements(&value)?)),
            },
        }
    }
}

fn exactly<const N: usize>(name: &str, args: Vec<Object>) -> EvalResult<[Object; N]> {
    let count = args.len();
    args.try_into()
        .map_err(|_| EvaluatorError::arity(name, N.to_string(), count))
}

fn optional(name: &str, mut args: Vec<Object>) -> EvalResult<Option<Object>> {
    match args.len() {
        0 => Ok(None),
        1 => Ok(args.pop()),
        n => Err(EvaluatorError::arity(name, "at most 1", n)),
    }
}

/// `str()` of a value: strings print bare, everything else as `repr`.
pub(super) fn display(value: &Object) -> EvalResult<String> {
    match value {
        Object::Str(s) => Ok(s.to_string()),
        other => repr(other, 0),
    }
}

pub(super) fn repr(value: &Object, nesting: usize) -> EvalResult<String> {
    if nesting > MAX_REPR_NESTING {
        return Err(EvaluatorError::value_error("value is nested too deeply to print"));
    }
    let join = |items: &[Object]| -> EvalResult<String> {
        Ok(items
            .iter()
            .map(|item| repr(item, nesting + 1))
            .collect::<EvalResult<Vec<_>>>()?
            .join(", "))
    };
    Ok(match value {
        Object::None => "None".to_string(),
        Object::Bool(true) => "True".to_string(),
        Object::Bool(false) => "False".to_string(),
        Object::Int(n) => n.to_string(),
        Object::Float(x) => format_float(*x),
        Object::Str(s) => quote_string(s),
        Object::List(items) => format!("[{}]", join(&items.borrow())?),
        Object::Tuple(items) if items.len() == 1 => format!("({},)", join(items)?),
        Object::Tuple(items) => format!("({})", join(items)?),
        Object::Range { start, stop, step: 1 } => format!("range({start}, {stop})"),
        Object::Range { start, stop, step } => format!("range({start}, {stop}, {step})"),
        Object::Function(function) => format!("<function {}>", function.name),
        Object::Builtin(builtin) => format!("<built-in function {}>", builtin.name()),
    })
}

/// Repeat a sequence `count` times, refusing oversized results.
pub(super) fn repeat<T: Clone>(items: &[T], count: i64) -> EvalResult<Vec<T>> {
    let count = usize::try_from(count).unwrap_or(0);
    if items.len().saturating_mul(count) > MAX_SEQUENCE_LEN {
        return Err(EvaluatorError::value_error("repetition result too large"));
    }
    let mut out = Vec::with_capacity(items.len() * count);
    for _ in 0..count {
        out.extend_from_slice(items);
    }
    Ok(out)
}
