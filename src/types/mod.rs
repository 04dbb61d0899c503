//! Contract data model.
//!
//! Contract functions may only take and return types drawn from a restricted,
//! recursively structured type system:
//! - the scalars of the [`BasicKind`] registry
//! - fixed-length arrays, `Vec`s and string-keyed maps of valid types
//! - structs whose fields are all valid types, optionally wrapped in `Option`
//! - the dynamic [`Value`]
//!
//! Types describe themselves through [`DataType::type_desc`] and the
//! resulting [`TypeDesc`] tree is checked once, at registration time, by
//! [`validate`].
//!
//! ## Known quirk
//!
//! Struct validation walks every declared field. A field that is skipped on
//! the wire must still be a valid type.

pub mod basic;
pub mod value;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::hash::Hash;

use serde::de::DeserializeOwned;
use serde::Serialize;

pub use basic::{BasicKind, ConversionError};
pub use value::Value;

/// Runtime description of a contract type
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeDesc {
    /// A registry scalar
    Basic(BasicKind),
    /// The universal dynamic type
    Any,
    /// The error slot of a fallible return
    Error,
    /// Fixed-length array
    Array(Box<TypeDesc>, usize),
    /// Growable sequence
    Slice(Box<TypeDesc>),
    /// Keyed map
    Map {
        /// Backing collection
        flavor: MapFlavor,
        /// Key type
        key: Box<TypeDesc>,
        /// Value type
        value: Box<TypeDesc>,
    },
    /// Named record
    Struct(StructDesc),
    /// Nillable wrapper (`Option<T>`)
    Optional(Box<TypeDesc>),
    /// A named type outside the data model
    Opaque(String),
}

/// Which map collection a [`TypeDesc::Map`] was described from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapFlavor {
    /// `std::collections::HashMap`
    Hash,
    /// `std::collections::BTreeMap`
    BTree,
}

/// Struct name and its fields in declaration order
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDesc {
    /// Type name
    pub name: String,
    /// Serialized field names and their types
    pub fields: Vec<(String, TypeDesc)>,
}

impl StructDesc {
    /// Start a struct description
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Add a field of type `T`
    #[must_use]
    pub fn field<T: DataType>(mut self, name: impl Into<String>) -> Self {
        self.fields.push((name.into(), T::type_desc()));
        self
    }
}

impl TypeDesc {
    /// Array, slice, map, struct or nillable struct: values of these types are
    /// rendered as JSON rather than plain text.
    #[must_use]
    pub fn is_marshaling(&self) -> bool {
        match self {
            Self::Array(..) | Self::Slice(_) | Self::Map { .. } | Self::Struct(_) => true,
            Self::Optional(inner) => matches!(**inner, Self::Struct(_)),
            _ => false,
        }
    }

    /// The basic kind, for scalars
    #[must_use]
    pub const fn basic(&self) -> Option<BasicKind> {
        match self {
            Self::Basic(kind) => Some(*kind),
            _ => None,
        }
    }
}

impl fmt::Display for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic(kind) => write!(f, "{kind}"),
            Self::Any => f.write_str("Value"),
            Self::Error => f.write_str("error"),
            Self::Array(elem, len) => write!(f, "[{elem}; {len}]"),
            Self::Slice(elem) => write!(f, "Vec<{elem}>"),
            Self::Map { flavor, key, value } => match flavor {
                MapFlavor::Hash => write!(f, "HashMap<{key}, {value}>"),
                MapFlavor::BTree => write!(f, "BTreeMap<{key}, {value}>"),
            },
            Self::Struct(desc) => f.write_str(&desc.name),
            Self::Optional(inner) => write!(f, "Option<{inner}>"),
            Self::Opaque(name) => f.write_str(name),
        }
    }
}

/// Type validation failures
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// Element type of a zero-length array cannot be inspected
    #[error("Arrays must have length greater than 0")]
    ZeroLengthArray,

    /// Map keyed by something other than `String`
    #[error("Map key type {0} is not valid. Expected String")]
    InvalidMapKey(String),

    /// Type is outside the data model
    #[error("Type {type_name} is not valid. Expected a struct or one of the basic types {basic} or an array/slice of these")]
    Invalid {
        /// Offending type
        type_name: String,
        /// Sorted registry names
        basic: String,
    },

    /// Type is outside the data model, with extra allowed types in play
    #[error("Type {type_name} is not valid. Expected a struct, one of the basic types {basic}, an array/slice of these, or one of these additional types {additional}")]
    InvalidWithAdditional {
        /// Offending type
        type_name: String,
        /// Sorted registry names
        basic: String,
        /// Allow-listed type names
        additional: String,
    },
}

/// Check that `desc` belongs to the data model.
///
/// Types listed in `additional` are accepted as they are, except that arrays
/// and slices are always checked through their element type.
pub fn validate(desc: &TypeDesc, additional: &[TypeDesc]) -> Result<(), TypeError> {
    match desc {
        TypeDesc::Array(elem, len) => {
            if *len == 0 {
                return Err(TypeError::ZeroLengthArray);
            }
            validate(elem, additional)
        }
        TypeDesc::Slice(elem) => validate(elem, additional),
        TypeDesc::Map { key, value, .. } => {
            if **key != TypeDesc::Basic(BasicKind::String) {
                return Err(TypeError::InvalidMapKey(key.to_string()));
            }
            validate(value, additional)
        }
        _ if additional.contains(desc) => Ok(()),
        TypeDesc::Struct(s) => s
            .fields
            .iter()
            .try_for_each(|(_, field)| validate(field, additional)),
        TypeDesc::Optional(inner) if matches!(**inner, TypeDesc::Struct(_)) => {
            validate(inner, additional)
        }
        TypeDesc::Basic(_) | TypeDesc::Any => Ok(()),
        TypeDesc::Optional(_) | TypeDesc::Error | TypeDesc::Opaque(_) => {
            Err(invalid(desc, additional))
        }
    }
}

/// Reject zero-length arrays anywhere inside `desc`
pub fn check_array_lengths(desc: &TypeDesc) -> Result<(), TypeError> {
    match desc {
        TypeDesc::Array(_, 0) => Err(TypeError::ZeroLengthArray),
        TypeDesc::Array(elem, _) | TypeDesc::Slice(elem) | TypeDesc::Optional(elem) => {
            check_array_lengths(elem)
        }
        TypeDesc::Map { value, .. } => check_array_lengths(value),
        TypeDesc::Struct(s) => s
            .fields
            .iter()
            .try_for_each(|(_, field)| check_array_lengths(field)),
        TypeDesc::Basic(_) | TypeDesc::Any | TypeDesc::Error | TypeDesc::Opaque(_) => Ok(()),
    }
}

fn invalid(desc: &TypeDesc, additional: &[TypeDesc]) -> TypeError {
    let basic = format!("[{}]", BasicKind::sorted_names().join(", "));
    if additional.is_empty() {
        TypeError::Invalid {
            type_name: desc.to_string(),
            basic,
        }
    } else {
        let names: Vec<String> = additional.iter().map(ToString::to_string).collect();
        TypeError::InvalidWithAdditional {
            type_name: desc.to_string(),
            basic,
            additional: format!("[{}]", names.join(", ")),
        }
    }
}

/// A Rust type usable as a contract parameter or return value
pub trait DataType: Serialize + DeserializeOwned + Send + 'static {
    /// Describe the static type
    fn type_desc() -> TypeDesc;

    /// Plain-text rendering used for non-marshaling success values
    fn to_text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Whether this value is a nil of a nillable type
    fn is_nil(&self) -> bool {
        false
    }

    /// Concrete type of this particular value
    fn runtime_desc(&self) -> TypeDesc {
        Self::type_desc()
    }

    /// Wrap into a dynamic value
    fn into_value(self) -> Value
    where
        Self: Sized,
    {
        Value::wrap(self)
    }

    /// Recover from a dynamic value
    fn from_value(value: Value) -> Option<Self>
    where
        Self: Sized,
    {
        value.downcast().ok()
    }
}

macro_rules! impl_basic {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl DataType for $ty {
                fn type_desc() -> TypeDesc {
                    TypeDesc::Basic(BasicKind::$kind)
                }

                fn to_text(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_basic! {
    bool => Bool,
    String => String,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
}

// Serializable, but not part of the data model
macro_rules! impl_opaque {
    ($($ty:ty),* $(,)?) => {
        $(
            impl DataType for $ty {
                fn type_desc() -> TypeDesc {
                    TypeDesc::Opaque(stringify!($ty).to_string())
                }

                fn to_text(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_opaque!(i128, u128, char);

impl<T: DataType> DataType for Vec<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Slice(Box::new(T::type_desc()))
    }
}

impl<T: DataType, const N: usize> DataType for [T; N]
where
    [T; N]: Serialize + DeserializeOwned,
{
    fn type_desc() -> TypeDesc {
        TypeDesc::Array(Box::new(T::type_desc()), N)
    }
}

impl<K, V> DataType for HashMap<K, V>
where
    K: DataType + Eq + Hash,
    V: DataType,
{
    fn type_desc() -> TypeDesc {
        TypeDesc::Map {
            flavor: MapFlavor::Hash,
            key: Box::new(K::type_desc()),
            value: Box::new(V::type_desc()),
        }
    }
}

impl<K, V> DataType for BTreeMap<K, V>
where
    K: DataType + Ord,
    V: DataType,
{
    fn type_desc() -> TypeDesc {
        TypeDesc::Map {
            flavor: MapFlavor::BTree,
            key: Box::new(K::type_desc()),
            value: Box::new(V::type_desc()),
        }
    }
}

impl<T: DataType> DataType for Option<T> {
    fn type_desc() -> TypeDesc {
        TypeDesc::Optional(Box::new(T::type_desc()))
    }

    fn is_nil(&self) -> bool {
        self.is_none()
    }
}

impl DataType for serde_json::Value {
    fn type_desc() -> TypeDesc {
        TypeDesc::Any
    }

    fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    fn is_nil(&self) -> bool {
        self.is_null()
    }

    fn runtime_desc(&self) -> TypeDesc {
        match self {
            Self::Null => TypeDesc::Any,
            Self::Bool(_) => TypeDesc::Basic(BasicKind::Bool),
            Self::Number(n) if n.is_u64() => TypeDesc::Basic(BasicKind::U64),
            Self::Number(n) if n.is_i64() => TypeDesc::Basic(BasicKind::I64),
            Self::Number(_) => TypeDesc::Basic(BasicKind::F64),
            Self::String(_) => TypeDesc::Basic(BasicKind::String),
            Self::Array(_) => TypeDesc::Slice(Box::new(TypeDesc::Any)),
            Self::Object(_) => TypeDesc::Map {
                flavor: MapFlavor::BTree,
                key: Box::new(TypeDesc::Basic(BasicKind::String)),
                value: Box::new(TypeDesc::Any),
            },
        }
    }

    fn from_value(value: Value) -> Option<Self> {
        match value.downcast::<Self>() {
            Ok(json) => Some(json),
            Err(other) => other.to_json().ok(),
        }
    }
}

/// Implement [`DataType`] for a struct by listing its serialized fields.
///
/// Field types must not lead back to the struct itself: recursive types are
/// not part of the data model and describing one never terminates.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct Asset {
///     id: String,
///     value: u64,
/// }
///
/// describe_struct!(Asset { id: String, value: u64 });
/// ```
#[macro_export]
macro_rules! describe_struct {
    ($name:ident { $($field:ident : $ty:ty),* $(,)? }) => {
        impl $crate::types::DataType for $name {
            fn type_desc() -> $crate::types::TypeDesc {
                $crate::types::TypeDesc::Struct(
                    $crate::types::StructDesc::new(stringify!($name))
                        $(.field::<$ty>(stringify!($field)))*
                )
            }
        }
    };
}
