//! Basic-type registry.
//!
//! The fixed table of scalar kinds a contract function may take or return.
//! Each kind pairs a string converter (wire string to typed [`Value`]) with a
//! JSON schema generator used when building contract metadata.

use std::fmt;

use serde_json::json;

use super::Value;

/// Scalar kinds accepted as parameters and returns
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BasicKind {
    /// `bool`
    Bool,
    /// `String`
    String,
    /// `i8`
    I8,
    /// `i16`
    I16,
    /// `i32`
    I32,
    /// `i64`
    I64,
    /// `isize`
    Isize,
    /// `u8`
    U8,
    /// `u16`
    U16,
    /// `u32`
    U32,
    /// `u64`
    U64,
    /// `usize`
    Usize,
    /// `f32`
    F32,
    /// `f64`
    F64,
}

/// A wire string could not be converted to the requested scalar kind
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Cannot convert passed value {value} to {kind}")]
pub struct ConversionError {
    /// The raw wire string
    pub value: String,
    /// Target kind
    pub kind: BasicKind,
}

impl BasicKind {
    /// Every registered kind
    pub const ALL: [Self; 14] = [
        Self::Bool,
        Self::String,
        Self::I8,
        Self::I16,
        Self::I32,
        Self::I64,
        Self::Isize,
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::Usize,
        Self::F32,
        Self::F64,
    ];

    /// Canonical Rust spelling of the kind
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::String => "String",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::Isize => "isize",
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::U64 => "u64",
            Self::Usize => "usize",
            Self::F32 => "f32",
            Self::F64 => "f64",
        }
    }

    /// Sorted names of every registered kind, as listed in validation errors
    #[must_use]
    pub fn sorted_names() -> Vec<&'static str> {
        let mut names: Vec<&'static str> = Self::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names
    }

    /// Convert a wire string into a typed value of this kind.
    ///
    /// An empty string converts to the kind's zero value.
    pub fn convert(self, raw: &str) -> Result<Value, ConversionError> {
        let fail = || ConversionError {
            value: raw.to_string(),
            kind: self,
        };

        if raw.is_empty() {
            return Ok(self.zero());
        }

        let value = match self {
            Self::Bool => Value::new(parse_bool(raw).ok_or_else(fail)?),
            Self::String => Value::new(raw.to_string()),
            Self::I8 => Value::new(raw.parse::<i8>().map_err(|_| fail())?),
            Self::I16 => Value::new(raw.parse::<i16>().map_err(|_| fail())?),
            Self::I32 => Value::new(raw.parse::<i32>().map_err(|_| fail())?),
            Self::I64 => Value::new(raw.parse::<i64>().map_err(|_| fail())?),
            Self::Isize => Value::new(raw.parse::<isize>().map_err(|_| fail())?),
            Self::U8 => Value::new(raw.parse::<u8>().map_err(|_| fail())?),
            Self::U16 => Value::new(raw.parse::<u16>().map_err(|_| fail())?),
            Self::U32 => Value::new(raw.parse::<u32>().map_err(|_| fail())?),
            Self::U64 => Value::new(raw.parse::<u64>().map_err(|_| fail())?),
            Self::Usize => Value::new(raw.parse::<usize>().map_err(|_| fail())?),
            Self::F32 => Value::new(raw.parse::<f32>().map_err(|_| fail())?),
            Self::F64 => Value::new(raw.parse::<f64>().map_err(|_| fail())?),
        };
        Ok(value)
    }

    fn zero(self) -> Value {
        match self {
            Self::Bool => Value::new(false),
            Self::String => Value::new(String::new()),
            Self::I8 => Value::new(0_i8),
            Self::I16 => Value::new(0_i16),
            Self::I32 => Value::new(0_i32),
            Self::I64 => Value::new(0_i64),
            Self::Isize => Value::new(0_isize),
            Self::U8 => Value::new(0_u8),
            Self::U16 => Value::new(0_u16),
            Self::U32 => Value::new(0_u32),
            Self::U64 => Value::new(0_u64),
            Self::Usize => Value::new(0_usize),
            Self::F32 => Value::new(0_f32),
            Self::F64 => Value::new(0_f64),
        }
    }

    /// JSON schema fragment describing values of this kind
    #[must_use]
    pub fn schema(self) -> serde_json::Value {
        match self {
            Self::Bool => json!({ "type": "boolean" }),
            Self::String => json!({ "type": "string" }),
            Self::I8 => integer_schema(i8::MIN.into(), i8::MAX.into()),
            Self::I16 => integer_schema(i16::MIN.into(), i16::MAX.into()),
            Self::I32 => integer_schema(i32::MIN.into(), i32::MAX.into()),
            Self::I64 | Self::Isize => json!({ "type": "integer", "format": "int64" }),
            Self::U8 => unsigned_schema(u8::MAX.into()),
            Self::U16 => unsigned_schema(u16::MAX.into()),
            Self::U32 => unsigned_schema(u32::MAX.into()),
            Self::U64 | Self::Usize => json!({ "type": "integer", "minimum": 0 }),
            Self::F32 => json!({ "type": "number", "format": "float" }),
            Self::F64 => json!({ "type": "number", "format": "double" }),
        }
    }
}

impl fmt::Display for BasicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn integer_schema(min: i64, max: i64) -> serde_json::Value {
    json!({ "type": "integer", "format": "int32", "minimum": min, "maximum": max })
}

fn unsigned_schema(max: u64) -> serde_json::Value {
    json!({ "type": "integer", "minimum": 0, "maximum": max })
}

/// Accepts the same spellings as a conventional boolean flag parser
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
