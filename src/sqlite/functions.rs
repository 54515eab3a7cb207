//! Built-in SQL functions every connection gets unless overridden, and
//! the glue that registers [`UserFunction`]s on a native handle.

use std::panic::AssertUnwindSafe;

use indexmap::IndexMap;
use rusqlite::functions::{Context, FunctionFlags};

use crate::config::{FunctionError, UserFunction};
use crate::sqlite::Value;

/// `sqrt`, `mod` and `locate`, in registration order.
pub fn builtins() -> IndexMap<String, UserFunction> {
    IndexMap::from([
        ("sqrt".to_string(), UserFunction::new(1, sqrt).deterministic()),
        ("mod".to_string(), UserFunction::new(2, modulo).deterministic()),
        ("locate".to_string(), UserFunction::variadic(locate).deterministic()),
    ])
}

pub(crate) fn register(
    conn: &rusqlite::Connection,
    name: &str,
    function: &UserFunction,
) -> rusqlite::Result<()> {
    let mut flags = FunctionFlags::SQLITE_UTF8;
    if function.is_deterministic() {
        flags |= FunctionFlags::SQLITE_DETERMINISTIC;
    }
    let function = AssertUnwindSafe(function.clone());
    conn.create_scalar_function(name, function.arity(), flags, move |ctx: &Context<'_>| {
        let args: Vec<Value> = (0..ctx.len()).map(|i| Value::from(ctx.get_raw(i))).collect();
        function
            .call(&args)
            .map_err(rusqlite::Error::UserFunctionError)
    })
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Text(s) => s.trim().parse().ok(),
        other => other.as_f64(),
    }
}

fn integer(value: &Value) -> Option<i64> {
    match value {
        Value::Real(f) => Some(*f as i64),
        Value::Text(s) => s.trim().parse().ok(),
        other => other.as_i64(),
    }
}

fn sqrt(args: &[Value]) -> Result<Value, FunctionError> {
    Ok(match args.first().and_then(number) {
        Some(x) if x >= 0.0 => Value::Real(x.sqrt()),
        _ => Value::Null,
    })
}

fn modulo(args: &[Value]) -> Result<Value, FunctionError> {
    let a = args.first().and_then(integer);
    let b = args.get(1).and_then(integer);
    Ok(match (a, b) {
        (Some(a), Some(b)) if b != 0 => Value::Integer(a.wrapping_rem(b)),
        _ => Value::Null,
    })
}

/// `locate(needle, haystack[, offset])`: 1-based character position of
/// `needle` in `haystack` at or after `offset`, 0 when absent.
fn locate(args: &[Value]) -> Result<Value, FunctionError> {
    if !(2..=3).contains(&args.len()) {
        return Err("locate() takes 2 or 3 arguments".into());
    }
    let (Some(needle), Some(haystack)) = (text(&args[0]), text(&args[1])) else {
        return Ok(Value::Null);
    };
    let offset = args.get(2).and_then(integer).unwrap_or(1).max(1) as usize - 1;

    let start = match haystack.char_indices().nth(offset) {
        Some((byte, _)) => byte,
        None if offset == haystack.chars().count() => haystack.len(),
        None => return Ok(Value::Integer(0)),
    };
    let position = haystack[start..]
        .find(needle.as_str())
        .map(|byte| haystack[..start + byte].chars().count() as i64 + 1)
        .unwrap_or(0);
    Ok(Value::Integer(position))
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::Text(s) => Some(s.clone()),
        Value::Integer(i) => Some(i.to_string()),
        Value::Real(f) => Some(f.to_string()),
        Value::Blob(b) => Some(String::from_utf8_lossy(b).into_owned()),
        Value::Boolean(b) => Some(i64::from(*b).to_string()),
    }
}
