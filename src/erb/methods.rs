//! Built-in methods on values, as in `name.upcase`

use crate::error::{ErrorKind, RenderError};
use crate::value::Value;

fn arity(args: &[Value], expected: usize) -> Result<(), RenderError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(RenderError::wrong_arguments(args.len(), expected))
    }
}

/// Call `method` on `receiver`
pub(crate) fn call_method(
    receiver: &Value,
    method: &str,
    args: &[Value],
) -> Result<Value, RenderError> {
    // Methods every value has
    match method {
        "to_s" => {
            arity(args, 0)?;
            return Ok(Value::Str(receiver.to_string()));
        }
        "inspect" => {
            arity(args, 0)?;
            return Ok(Value::Str(receiver.inspect()));
        }
        "nil?" => {
            arity(args, 0)?;
            return Ok(Value::Bool(matches!(receiver, Value::Nil)));
        }
        _ => {}
    }

    let result = match receiver {
        Value::Str(s) => string_method(s, method, args)?,
        Value::List(items) => list_method(items, method, args)?,
        Value::Map(map) => match (map.get(method), args.is_empty()) {
            (Some(value), true) => Some(value.clone()),
            _ => map_method(map, method, args)?,
        },
        Value::Int(n) => int_method(*n, method, args)?,
        Value::Float(n) => float_method(*n, method, args)?,
        Value::Nil | Value::Bool(_) => None,
    };

    result.ok_or_else(|| RenderError::undefined_method_for(method, receiver.type_name()))
}

fn string_method(s: &str, method: &str, args: &[Value]) -> Result<Option<Value>, RenderError> {
    let value = match method {
        "upcase" => Value::Str(s.to_uppercase()),
        "downcase" => Value::Str(s.to_lowercase()),
        "capitalize" => {
            let mut chars = s.chars();
            let capitalized = match chars.next() {
                Some(first) => {
                    let rest = chars.as_str().to_lowercase();
                    first.to_uppercase().chain(rest.chars()).collect()
                }
                None => String::new(),
            };
            Value::Str(capitalized)
        }
        "strip" => Value::Str(s.trim().to_string()),
        "reverse" => Value::Str(s.chars().rev().collect()),
        "length" | "size" => Value::Int(s.chars().count() as i64),
        "empty?" => Value::Bool(s.is_empty()),
        "to_i" => Value::Int(leading_int(s)),
        "to_f" => Value::Float(s.trim().parse().unwrap_or(0.0)),
        "include?" => {
            arity(args, 1)?;
            match &args[0] {
                Value::Str(needle) => Value::Bool(s.contains(needle.as_str())),
                other => {
                    return Err(RenderError::type_error(format!(
                        "no implicit conversion of {} into String",
                        other.type_name()
                    )))
                }
            }
        }
        _ => return Ok(None),
    };
    if method != "include?" {
        arity(args, 0)?;
    }
    Ok(Some(value))
}

fn list_method(
    items: &[Value],
    method: &str,
    args: &[Value],
) -> Result<Option<Value>, RenderError> {
    let value = match method {
        "length" | "size" => {
            arity(args, 0)?;
            Value::Int(items.len() as i64)
        }
        "empty?" => {
            arity(args, 0)?;
            Value::Bool(items.is_empty())
        }
        "first" => {
            arity(args, 0)?;
            items.first().cloned().unwrap_or_default()
        }
        "last" => {
            arity(args, 0)?;
            items.last().cloned().unwrap_or_default()
        }
        "reverse" => {
            arity(args, 0)?;
            Value::List(items.iter().rev().cloned().collect())
        }
        "join" => {
            let sep = match args {
                [] => String::new(),
                [Value::Str(sep)] => sep.clone(),
                [other] => {
                    return Err(RenderError::type_error(format!(
                        "no implicit conversion of {} into String",
                        other.type_name()
                    )))
                }
                _ => return Err(RenderError::wrong_arguments(args.len(), 1)),
            };
            Value::Str(
                items
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        "include?" => {
            arity(args, 1)?;
            Value::Bool(items.contains(&args[0]))
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn map_method(
    map: &std::collections::BTreeMap<String, Value>,
    method: &str,
    args: &[Value],
) -> Result<Option<Value>, RenderError> {
    let value = match method {
        "length" | "size" => {
            arity(args, 0)?;
            Value::Int(map.len() as i64)
        }
        "empty?" => {
            arity(args, 0)?;
            Value::Bool(map.is_empty())
        }
        "keys" => {
            arity(args, 0)?;
            Value::List(map.keys().cloned().map(Value::Str).collect())
        }
        "values" => {
            arity(args, 0)?;
            Value::List(map.values().cloned().collect())
        }
        "include?" | "key?" => {
            arity(args, 1)?;
            Value::Bool(
                args[0]
                    .as_str()
                    .map(|k| map.contains_key(k))
                    .unwrap_or(false),
            )
        }
        _ => return Ok(None),
    };
    Ok(Some(value))
}

fn int_method(n: i64, method: &str, args: &[Value]) -> Result<Option<Value>, RenderError> {
    let value = match method {
        "to_i" => Value::Int(n),
        "to_f" => Value::Float(n as f64),
        "abs" => Value::Int(n.checked_abs().ok_or_else(|| {
            RenderError::new(ErrorKind::ArgumentError, "integer overflow")
        })?),
        _ => return Ok(None),
    };
    arity(args, 0)?;
    Ok(Some(value))
}

fn float_method(n: f64, method: &str, args: &[Value]) -> Result<Option<Value>, RenderError> {
    let value = match method {
        "to_i" => Value::Int(n.trunc() as i64),
        "to_f" => Value::Float(n),
        "abs" => Value::Float(n.abs()),
        _ => return Ok(None),
    };
    arity(args, 0)?;
    Ok(Some(value))
}

/// Parse the leading integer of `s`, or 0
fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (sign, digits) = match s.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, s.strip_prefix('+').unwrap_or(s)),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    digits[..end].parse::<i64>().map(|n| sign * n).unwrap_or(0)
}

/// `target[index]`
pub(crate) fn index(target: &Value, index: &Value) -> Result<Value, RenderError> {
    match (target, index) {
        (Value::List(items), Value::Int(i)) => Ok(position(items.len(), *i)
            .and_then(|i| items.get(i).cloned())
            .unwrap_or_default()),
        (Value::Str(s), Value::Int(i)) => {
            let chars: Vec<char> = s.chars().collect();
            Ok(position(chars.len(), *i)
                .and_then(|i| chars.get(i))
                .map(|c| Value::Str(c.to_string()))
                .unwrap_or_default())
        }
        (Value::Map(map), Value::Str(key)) => Ok(map.get(key).cloned().unwrap_or_default()),
        (Value::Map(_), _) => Ok(Value::Nil),
        (Value::List(_) | Value::Str(_), other) => Err(RenderError::type_error(format!(
            "no implicit conversion of {} into Integer",
            other.type_name()
        ))),
        (other, _) => Err(RenderError::new(
            ErrorKind::NoMethodError,
            format!("undefined method `[]' for {}", other.type_name()),
        )),
    }
}

/// Resolve a possibly negative index against `len`
fn position(len: usize, i: i64) -> Option<usize> {
    if i >= 0 {
        Some(i as usize)
    } else {
        len.checked_sub(i.unsigned_abs() as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(receiver: Value, method: &str, args: &[Value]) -> Value {
        call_method(&receiver, method, args).expect("Should succeed")
    }

    #[test]
    fn test_string_methods() {
        assert_eq!(call("abc".into(), "upcase", &[]), Value::from("ABC"));
        assert_eq!(call("hELLO".into(), "capitalize", &[]), Value::from("Hello"));
        assert_eq!(call("  x ".into(), "strip", &[]), Value::from("x"));
        assert_eq!(call("héllo".into(), "length", &[]), Value::Int(5));
        assert_eq!(call("42abc".into(), "to_i", &[]), Value::Int(42));
        assert_eq!(
            call("abc".into(), "include?", &["b".into()]),
            Value::Bool(true)
        );
    }

    #[test]
    fn test_list_methods() {
        let list = Value::from(vec![1i64, 2, 3]);
        assert_eq!(call(list.clone(), "size", &[]), Value::Int(3));
        assert_eq!(call(list.clone(), "first", &[]), Value::Int(1));
        assert_eq!(call(list.clone(), "join", &["-".into()]), Value::from("1-2-3"));
        assert_eq!(call(Value::List(vec![]), "last", &[]), Value::Nil);
    }

    #[test]
    fn test_integer_methods_keep_precision() {
        assert_eq!(call(Value::Int(i64::MAX), "to_i", &[]), Value::Int(i64::MAX));
        assert_eq!(call(Value::Int(-(1 << 60) - 1), "abs", &[]), Value::Int((1 << 60) + 1));
        assert_eq!(call(Value::Float(-2.5), "abs", &[]), Value::Float(2.5));

        let err = call_method(&Value::Int(i64::MIN), "abs", &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentError);
    }

    #[test]
    fn test_map_member_access() {
        let mut map = std::collections::BTreeMap::new();
        map.insert("name".to_string(), Value::from("ann"));
        let value = Value::Map(map);
        assert_eq!(call(value.clone(), "name", &[]), Value::from("ann"));
        assert_eq!(call(value, "keys", &[]), Value::from(vec!["name"]));
    }

    #[test]
    fn test_unknown_method() {
        let err = call_method(&Value::Nil, "upcase", &[]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::NoMethodError);
        assert!(err.message.contains("`upcase' for NilClass"));
    }

    #[test]
    fn test_wrong_arity() {
        let err = call_method(&Value::from("a"), "upcase", &[Value::Int(1)]).unwrap_err();
        assert_eq!(err.kind, ErrorKind::ArgumentError);
    }

    #[test]
    fn test_indexing() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(index(&list, &Value::Int(-1)).unwrap(), Value::from("b"));
        assert_eq!(index(&list, &Value::Int(5)).unwrap(), Value::Nil);
        assert!(index(&Value::Nil, &Value::Int(0)).is_err());
    }
}
