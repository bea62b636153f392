//! Runs compiled ERB ops against a frame
//!
//! Every error entering this method (from a helper, a nested method or a
//! failing operation) gets exactly one frame pointing at the expression that
//! raised it, so backtraces name template lines rather than Rust code.

use std::path::Path;

use super::ast::{BinaryOp, Expr, Spanned, UnaryOp};
use super::compiler::Op;
use super::methods;
use super::ErbMixin;
use crate::engine::Mixin;
use crate::error::{ErrorKind, Location, RenderError};
use crate::host::Frame;
use crate::source::{LineIndex, Span};
use crate::value::Value;

/// The compiled method an op belongs to
pub(crate) struct Context<'m> {
    pub path: &'m Path,
    pub name: &'m str,
    pub lines: &'m LineIndex,
}

impl Context<'_> {
    fn locate(&self, err: RenderError, span: &Span) -> RenderError {
        err.with_frame(Location {
            file: self.path.to_path_buf(),
            line: self.lines.line_of(span.start),
            span: Some(span.clone()),
            label: self.name.to_string(),
        })
    }
}

pub(crate) fn exec<'e>(
    ops: &[Op],
    frame: &mut Frame<'e>,
    cx: &Context<'_>,
) -> Result<(), RenderError> {
    for op in ops {
        match op {
            Op::Text(text) => frame.write(text),
            Op::Output(expr) => {
                let value = eval(expr, frame, cx)?;
                frame.write(&value.to_string());
            }
            Op::Eval(expr) => {
                eval(expr, frame, cx)?;
            }
            Op::Assign { var, value } => {
                let value = eval(value, frame, cx)?;
                frame.set_local(var.clone(), value);
            }
            Op::Branch { arms, otherwise } => {
                let mut taken = None;
                for (cond, body) in arms {
                    if eval(cond, frame, cx)?.truthy() {
                        taken = Some(body);
                        break;
                    }
                }
                exec(taken.unwrap_or(otherwise), frame, cx)?;
            }
            Op::Each { var, iter, body } => {
                let items = match eval(iter, frame, cx)? {
                    Value::List(items) => items,
                    Value::Map(map) => map
                        .into_iter()
                        .map(|(k, v)| Value::List(vec![Value::Str(k), v]))
                        .collect(),
                    other => {
                        return Err(cx.locate(
                            RenderError::undefined_method_for("each", other.type_name()),
                            &iter.span,
                        ))
                    }
                };
                for item in items {
                    frame.set_local(var.clone(), item);
                    exec(body, frame, cx)?;
                }
            }
            Op::Capture { var, body } => {
                let mixin: &dyn Mixin = frame.mixin().unwrap_or(&ErbMixin);
                let captured = mixin.capture(frame, &mut |f: &mut Frame<'e>| exec(body, f, cx))?;
                frame.set_local(var.clone(), Value::Str(captured));
            }
        }
    }
    Ok(())
}

pub(crate) fn eval(
    expr: &Spanned<Expr>,
    frame: &mut Frame<'_>,
    cx: &Context<'_>,
) -> Result<Value, RenderError> {
    let span = &expr.span;
    match &expr.node {
        Expr::Nil => Ok(Value::Nil),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Float(n) => Ok(Value::Float(*n)),
        Expr::Str(s) => Ok(Value::Str(s.clone())),
        Expr::List(items) => items
            .iter()
            .map(|item| eval(item, frame, cx))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::List),
        // Unset assigns read as nil
        Expr::Ivar(name) => Ok(frame.assign(name).cloned().unwrap_or_default()),
        Expr::Ident(name) => lookup(name, span, frame, cx),
        Expr::Call { name, args } => {
            let args = eval_args(args, frame, cx)?;
            call(name, &args, span, frame, cx)
        }
        Expr::MethodCall {
            receiver,
            method,
            args,
        } => {
            let receiver = eval(receiver, frame, cx)?;
            let args = eval_args(args, frame, cx)?;
            methods::call_method(&receiver, method, &args).map_err(|e| cx.locate(e, span))
        }
        Expr::Index { target, index } => {
            let target = eval(target, frame, cx)?;
            let index = eval(index, frame, cx)?;
            methods::index(&target, &index).map_err(|e| cx.locate(e, span))
        }
        Expr::Unary { op, operand } => {
            let value = eval(operand, frame, cx)?;
            match (op, value) {
                (UnaryOp::Not, value) => Ok(Value::Bool(!value.truthy())),
                (UnaryOp::Neg, Value::Int(n)) => {
                    checked(n.checked_neg()).map_err(|e| cx.locate(e, span))
                }
                (UnaryOp::Neg, Value::Float(n)) => Ok(Value::Float(-n)),
                (UnaryOp::Neg, other) => Err(cx.locate(
                    RenderError::undefined_method_for("-@", other.type_name()),
                    span,
                )),
            }
        }
        Expr::Binary { op, lhs, rhs } => match op {
            BinaryOp::And => {
                let left = eval(lhs, frame, cx)?;
                if left.truthy() {
                    eval(rhs, frame, cx)
                } else {
                    Ok(left)
                }
            }
            BinaryOp::Or => {
                let left = eval(lhs, frame, cx)?;
                if left.truthy() {
                    Ok(left)
                } else {
                    eval(rhs, frame, cx)
                }
            }
            _ => {
                let left = eval(lhs, frame, cx)?;
                let right = eval(rhs, frame, cx)?;
                binary(*op, left, right).map_err(|e| cx.locate(e, span))
            }
        },
    }
}

fn eval_args(
    args: &[Spanned<Expr>],
    frame: &mut Frame<'_>,
    cx: &Context<'_>,
) -> Result<Vec<Value>, RenderError> {
    args.iter().map(|arg| eval(arg, frame, cx)).collect()
}

/// Bare name: local, then helper, then host method
fn lookup(
    name: &str,
    span: &Span,
    frame: &mut Frame<'_>,
    cx: &Context<'_>,
) -> Result<Value, RenderError> {
    if let Some(value) = frame.local(name) {
        return Ok(value.clone());
    }
    if let Some(helper) = frame.host().helper(name) {
        return helper.call(frame, &[]).map_err(|e| cx.locate(e, span));
    }
    if frame.host().has_method(name) {
        return frame
            .call_method(name)
            .map(Value::Str)
            .map_err(|e| cx.locate(e, span));
    }
    Err(cx.locate(RenderError::undefined_name(name), span))
}

/// `name(args)`: helper, then host method
fn call(
    name: &str,
    args: &[Value],
    span: &Span,
    frame: &mut Frame<'_>,
    cx: &Context<'_>,
) -> Result<Value, RenderError> {
    if let Some(helper) = frame.host().helper(name) {
        return helper.call(frame, args).map_err(|e| cx.locate(e, span));
    }
    if frame.host().has_method(name) {
        if !args.is_empty() {
            return Err(cx.locate(RenderError::wrong_arguments(args.len(), 0), span));
        }
        return frame
            .call_method(name)
            .map(Value::Str)
            .map_err(|e| cx.locate(e, span));
    }
    Err(cx.locate(RenderError::undefined_method(name), span))
}

fn as_float(value: &Value) -> Option<f64> {
    match value {
        Value::Int(n) => Some(*n as f64),
        Value::Float(n) => Some(*n),
        _ => None,
    }
}

fn binary(op: BinaryOp, left: Value, right: Value) -> Result<Value, RenderError> {
    use BinaryOp::*;

    match op {
        Eq => return Ok(Value::Bool(values_equal(&left, &right))),
        NotEq => return Ok(Value::Bool(!values_equal(&left, &right))),
        Less | LessEq | Greater | GreaterEq => return compare(op, &left, &right),
        _ => {}
    }

    match (op, left, right) {
        (Add, Value::Int(a), Value::Int(b)) => checked(a.checked_add(b)),
        (Sub, Value::Int(a), Value::Int(b)) => checked(a.checked_sub(b)),
        (Mul, Value::Int(a), Value::Int(b)) => checked(a.checked_mul(b)),
        (Div | Rem, Value::Int(_), Value::Int(0)) => Err(RenderError::new(
            ErrorKind::ZeroDivisionError,
            "divided by 0",
        )),
        (Div, Value::Int(a), Value::Int(b)) => checked(floor_div(a, b)),
        (Rem, Value::Int(a), Value::Int(b)) => Ok(Value::Int(floor_rem(a, b))),
        (Add, Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
        (Add, Value::List(mut a), Value::List(b)) => {
            a.extend(b);
            Ok(Value::List(a))
        }
        (Mul, Value::Str(s), Value::Int(n)) => repeat(&s, n).map(Value::Str),
        (Add, Value::Str(_), other) => Err(RenderError::type_error(format!(
            "no implicit conversion of {} into String",
            other.type_name()
        ))),
        (op, left, right) => match (as_float(&left), as_float(&right)) {
            (Some(a), Some(b)) => Ok(Value::Float(match op {
                Add => a + b,
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a - b * (a / b).floor(),
            })),
            (Some(_), None) => Err(RenderError::type_error(format!(
                "{} can't be coerced into {}",
                right.type_name(),
                left.type_name()
            ))),
            _ => Err(RenderError::undefined_method_for(
                op.symbol(),
                left.type_name(),
            )),
        },
    }
}

fn checked(result: Option<i64>) -> Result<Value, RenderError> {
    result
        .map(Value::Int)
        .ok_or_else(|| RenderError::new(ErrorKind::ArgumentError, "integer overflow"))
}

/// Integer division rounding toward negative infinity; `b` is non-zero
fn floor_div(a: i64, b: i64) -> Option<i64> {
    let q = a.checked_div(b)?;
    if a % b != 0 && ((a < 0) != (b < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

/// Remainder with the sign of `b`; `b` is non-zero
fn floor_rem(a: i64, b: i64) -> i64 {
    let r = a.wrapping_rem(b);
    if r != 0 && ((r < 0) != (b < 0)) {
        r + b
    } else {
        r
    }
}

/// Longest string `*` may build
const MAX_REPEAT_LEN: usize = 1 << 24;

fn repeat(s: &str, n: i64) -> Result<String, RenderError> {
    let n = usize::try_from(n)
        .map_err(|_| RenderError::new(ErrorKind::ArgumentError, "negative argument"))?;
    match s.len().checked_mul(n) {
        Some(len) if len <= MAX_REPEAT_LEN => Ok(s.repeat(n)),
        _ => Err(RenderError::new(ErrorKind::ArgumentError, "argument too big")),
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (as_float(left), as_float(right)) {
        (Some(a), Some(b)) => a == b,
        _ => left == right,
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, RenderError> {
    use std::cmp::Ordering;

    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        _ => match (as_float(left), as_float(right)) {
            (Some(a), Some(b)) => a.partial_cmp(&b),
            _ => None,
        },
    };
    let Some(ordering) = ordering else {
        return Err(RenderError::new(
            ErrorKind::ArgumentError,
            format!(
                "comparison of {} with {} failed",
                left.type_name(),
                right.type_name()
            ),
        ));
    };
    let result = match op {
        BinaryOp::Less => ordering == Ordering::Less,
        BinaryOp::LessEq => ordering != Ordering::Greater,
        BinaryOp::Greater => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    };
    Ok(Value::Bool(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(
            binary(BinaryOp::Add, Value::Int(2), Value::Int(3)).unwrap(),
            Value::Int(5)
        );
        assert_eq!(
            binary(BinaryOp::Div, Value::Int(7), Value::Int(2)).unwrap(),
            Value::Int(3)
        );
    }

    #[test]
    fn test_division_floors() {
        let int = |op, a, b| binary(op, Value::Int(a), Value::Int(b)).unwrap();
        assert_eq!(int(BinaryOp::Div, 7, -2), Value::Int(-4));
        assert_eq!(int(BinaryOp::Div, -7, 2), Value::Int(-4));
        assert_eq!(int(BinaryOp::Div, -7, -2), Value::Int(3));
        assert_eq!(int(BinaryOp::Rem, 7, -2), Value::Int(-1));
        assert_eq!(int(BinaryOp::Rem, -7, 2), Value::Int(1));
        assert_eq!(int(BinaryOp::Rem, -7, -2), Value::Int(-1));
        assert_eq!(
            binary(BinaryOp::Rem, Value::Float(-7.5), Value::Int(2)).unwrap(),
            Value::Float(0.5)
        );
    }

    #[test]
    fn test_min_int_division_overflows() {
        let err = binary(BinaryOp::Div, Value::Int(i64::MIN), Value::Int(-1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentError);
        assert_eq!(err.message, "integer overflow");
        assert_eq!(
            binary(BinaryOp::Rem, Value::Int(i64::MIN), Value::Int(-1)).unwrap(),
            Value::Int(0)
        );
    }

    #[test]
    fn test_integer_overflow() {
        let err = binary(BinaryOp::Add, Value::Int(i64::MAX), Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentError);
        let err = binary(BinaryOp::Mul, Value::Int(i64::MIN), Value::Int(2)).unwrap_err();
        assert_eq!(err.message, "integer overflow");
    }

    #[test]
    fn test_string_repeat_bounds() {
        assert_eq!(
            binary(BinaryOp::Mul, Value::from("ab"), Value::Int(3)).unwrap(),
            Value::from("ababab")
        );
        let err = binary(BinaryOp::Mul, Value::from("ab"), Value::Int(i64::MAX)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentError);
        assert_eq!(err.message, "argument too big");
        let err = binary(BinaryOp::Mul, Value::from("ab"), Value::Int(-1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentError);
    }

    #[test]
    fn test_mixed_arithmetic_is_float() {
        assert_eq!(
            binary(BinaryOp::Mul, Value::Int(2), Value::Float(1.5)).unwrap(),
            Value::Float(3.0)
        );
    }

    #[test]
    fn test_division_by_zero() {
        let err = binary(BinaryOp::Div, Value::Int(1), Value::Int(0)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ZeroDivisionError);
    }

    #[test]
    fn test_string_concat_type_error() {
        let err = binary(BinaryOp::Add, Value::from("a"), Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::TypeError);
        assert!(err.message.contains("Integer into String"));
    }

    #[test]
    fn test_nil_arithmetic_is_no_method() {
        let err = binary(BinaryOp::Add, Value::Nil, Value::Int(1)).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoMethodError);
        assert!(err.message.contains("`+' for NilClass"));
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(
            binary(BinaryOp::Less, Value::Int(1), Value::Float(1.5)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            binary(BinaryOp::Eq, Value::Int(1), Value::Float(1.0)).unwrap(),
            Value::Bool(true)
        );
        assert!(binary(BinaryOp::Less, Value::Int(1), Value::from("a")).is_err());
    }
}
