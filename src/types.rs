//! Translation between the abstraction layer's logical types and the
//! engine's native storage classes.
//!
//! Host codes follow the PDO numbering used by DBAL callers, so a
//! parameter type or fetch style arriving as an integer (or a name from a
//! config file) is parsed here and rejected if it is not one we map.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::Type;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::sqlite::Value;

/// Logical type of a bound parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamType {
    Null,
    Integer,
    String,
    LargeObject,
    Boolean,
}

impl ParamType {
    pub const ALL: [ParamType; 5] = [
        ParamType::Null,
        ParamType::Integer,
        ParamType::String,
        ParamType::LargeObject,
        ParamType::Boolean,
    ];

    /// Host (PDO) code for this type.
    pub fn code(self) -> i32 {
        match self {
            ParamType::Null => 0,
            ParamType::Integer => 1,
            ParamType::String => 2,
            ParamType::LargeObject => 3,
            ParamType::Boolean => 5,
        }
    }

    /// Native storage class the engine binds this type as.
    pub fn native(self) -> Type {
        match self {
            ParamType::String => Type::Text,
            ParamType::Boolean => Type::Integer,
            ParamType::Null => Type::Null,
            ParamType::Integer => Type::Integer,
            ParamType::LargeObject => Type::Blob,
        }
    }
}

impl TryFrom<i32> for ParamType {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        ParamType::ALL
            .into_iter()
            .find(|ty| ty.code() == code)
            .ok_or_else(|| Error::UnknownType(code.to_string()))
    }
}

impl FromStr for ParamType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "null" => Ok(ParamType::Null),
            "int" | "integer" => Ok(ParamType::Integer),
            "str" | "string" | "text" => Ok(ParamType::String),
            "lob" | "blob" | "large_object" => Ok(ParamType::LargeObject),
            "bool" | "boolean" => Ok(ParamType::Boolean),
            _ => Err(Error::UnknownType(s.to_string())),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::Null => "null",
            ParamType::Integer => "integer",
            ParamType::String => "string",
            ParamType::LargeObject => "large_object",
            ParamType::Boolean => "boolean",
        };
        f.write_str(name)
    }
}

/// Shape of the rows returned by fetch operations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchStyle {
    /// Values keyed by column position.
    Numeric,
    /// Values keyed by column name.
    Associative,
    /// Both of the above over the same values.
    #[default]
    Both,
}

impl FetchStyle {
    pub const ALL: [FetchStyle; 3] = [
        FetchStyle::Associative,
        FetchStyle::Numeric,
        FetchStyle::Both,
    ];

    /// Host (PDO) code for this style.
    pub fn code(self) -> i32 {
        match self {
            FetchStyle::Associative => 2,
            FetchStyle::Numeric => 3,
            FetchStyle::Both => 4,
        }
    }
}

impl TryFrom<i32> for FetchStyle {
    type Error = Error;

    fn try_from(code: i32) -> Result<Self> {
        FetchStyle::ALL
            .into_iter()
            .find(|style| style.code() == code)
            .ok_or_else(|| Error::UnknownFetchStyle(code.to_string()))
    }
}

impl FromStr for FetchStyle {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "num" | "numeric" => Ok(FetchStyle::Numeric),
            "assoc" | "associative" => Ok(FetchStyle::Associative),
            "both" => Ok(FetchStyle::Both),
            _ => Err(Error::UnknownFetchStyle(s.to_string())),
        }
    }
}

/// Convert `value` to the native value the engine should bind.
///
/// Without a logical type the storage class follows the value's own
/// variant. NULL binds as NULL whatever the requested type.
pub fn to_native(value: &Value, ty: Option<ParamType>) -> rusqlite::types::Value {
    use rusqlite::types::Value as Native;

    let Some(ty) = ty else {
        return match value {
            Value::Null => Native::Null,
            Value::Integer(i) => Native::Integer(*i),
            Value::Real(f) => Native::Real(*f),
            Value::Text(s) => Native::Text(s.clone()),
            Value::Blob(b) => Native::Blob(b.clone()),
            Value::Boolean(b) => Native::Integer(i64::from(*b)),
        };
    };

    if value.is_null() {
        return Native::Null;
    }
    match ty.native() {
        Type::Null => Native::Null,
        Type::Integer => Native::Integer(integer_of(value)),
        Type::Text => Native::Text(text_of(value)),
        Type::Blob => Native::Blob(match value {
            Value::Blob(b) => b.clone(),
            other => text_of(other).into_bytes(),
        }),
        Type::Real => Native::Real(match value {
            Value::Real(f) => *f,
            other => integer_of(other) as f64,
        }),
    }
}

fn integer_of(value: &Value) -> i64 {
    match value {
        Value::Null => 0,
        Value::Integer(i) => *i,
        Value::Real(f) => *f as i64,
        Value::Boolean(b) => i64::from(*b),
        Value::Text(s) => leading_integer(s),
        Value::Blob(b) => leading_integer(&String::from_utf8_lossy(b)),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(f) => f.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        Value::Boolean(true) => "1".to_string(),
        Value::Boolean(false) => String::new(),
    }
}

/// Integer value of the numeric prefix of `s`, or 0 when there is none.
fn leading_integer(s: &str) -> i64 {
    let trimmed = s.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return n;
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        return f as i64;
    }
    let end = trimmed
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+')))
        .map(|(i, c)| i + c.len_utf8())
        .last()
        .unwrap_or(0);
    trimmed[..end].parse::<i64>().unwrap_or(0)
}
