//! Dynamically typed values.
//!
//! A [`Value`] carries the declared [`TypeDesc`] of what it holds plus an
//! opaque, boxed payload. Decoded arguments and raw call results travel as
//! values between the codec, the erased callables and the response handler.
//! `Value` is also the universal "any" type a contract function can declare.

use std::any::Any;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{DataType, TypeDesc};

trait Reflect: Send {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
    fn to_json_string(&self) -> serde_json::Result<String>;
    fn to_text(&self) -> String;
    fn is_nil(&self) -> bool;
    fn runtime_desc(&self) -> TypeDesc;
}

impl<T: DataType> Reflect for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }

    fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    fn to_text(&self) -> String {
        DataType::to_text(self)
    }

    fn is_nil(&self) -> bool {
        DataType::is_nil(self)
    }

    fn runtime_desc(&self) -> TypeDesc {
        DataType::runtime_desc(self)
    }
}

/// A dynamically typed contract value
pub struct Value {
    desc: TypeDesc,
    inner: Option<Box<dyn Reflect>>,
}

impl Value {
    /// Wrap a typed value
    pub fn new<T: DataType>(value: T) -> Self {
        value.into_value()
    }

    pub(crate) fn wrap<T: DataType>(value: T) -> Self {
        Self {
            desc: T::type_desc(),
            inner: Some(Box::new(value)),
        }
    }

    /// The "no value was produced" sentinel
    #[must_use]
    pub fn undefined() -> Self {
        Self {
            desc: TypeDesc::Any,
            inner: None,
        }
    }

    /// A declared slot of type `desc` that holds nothing
    #[must_use]
    pub fn absent(desc: TypeDesc) -> Self {
        Self { desc, inner: None }
    }

    /// Whether no payload is present
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        self.inner.is_none()
    }

    /// Whether the payload is missing or is a nil of a nillable type
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.inner.as_ref().map_or(true, |inner| inner.is_nil())
    }

    /// Declared type of the payload
    #[must_use]
    pub fn declared_desc(&self) -> &TypeDesc {
        &self.desc
    }

    /// Concrete type of the payload, looking through dynamic values
    #[must_use]
    pub fn runtime_desc(&self) -> TypeDesc {
        self.inner
            .as_ref()
            .map_or(TypeDesc::Any, |inner| inner.runtime_desc())
    }

    /// Borrow the payload as `T`
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.as_ref()?.as_any().downcast_ref()
    }

    /// Take the payload as `T`, handing the value back on mismatch
    pub fn downcast<T: 'static>(self) -> Result<T, Self> {
        let is_t = self.downcast_ref::<T>().is_some();
        match self.inner {
            Some(inner) if is_t => inner
                .into_any()
                .downcast::<T>()
                .map(|boxed| *boxed)
                .map_err(|_| Self::undefined()),
            inner => Err(Self {
                desc: self.desc,
                inner,
            }),
        }
    }

    /// Canonical JSON text of the payload (`null` when absent)
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        self.inner
            .as_ref()
            .map_or_else(|| Ok("null".to_string()), |inner| inner.to_json_string())
    }

    /// JSON form of the payload (`null` when absent)
    ///
    /// Parsed back from [`Value::to_json_string`] so field order and `f32`
    /// digits match the text form.
    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::from_str(&self.to_json_string()?)
    }

    /// Plain-text rendering of the payload (empty when absent)
    #[must_use]
    pub fn to_text(&self) -> String {
        self.inner
            .as_ref()
            .map_or_else(String::new, |inner| inner.to_text())
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            None => write!(f, "Value<{}>(undefined)", self.desc),
            Some(inner) => match inner.to_json_string() {
                Ok(json) => write!(f, "Value<{}>({json})", self.desc),
                Err(_) => write!(f, "Value<{}>(..)", self.desc),
            },
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json()
            .map_err(serde::ser::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Self::wrap)
    }
}

impl DataType for Value {
    fn type_desc() -> TypeDesc {
        TypeDesc::Any
    }

    fn to_text(&self) -> String {
        Self::to_text(self)
    }

    fn is_nil(&self) -> bool {
        Self::is_nil(self)
    }

    fn runtime_desc(&self) -> TypeDesc {
        Self::runtime_desc(self)
    }

    fn into_value(self) -> Value {
        self
    }

    fn from_value(value: Value) -> Option<Self> {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BasicKind;

    #[test]
    fn test_downcast() {
        let value = Value::new(42_u32);
        assert_eq!(value.declared_desc(), &TypeDesc::Basic(BasicKind::U32));
        assert_eq!(value.downcast_ref::<u32>(), Some(&42));

        let value = value.downcast::<i64>().unwrap_err();
        assert_eq!(value.downcast::<u32>().ok(), Some(42));
    }

    #[test]
    fn test_value_does_not_nest() {
        let inner = Value::new(String::from("x"));
        let outer = Value::new(inner);
        assert_eq!(outer.downcast_ref::<String>().map(String::as_str), Some("x"));
    }

    #[test]
    fn test_undefined() {
        let value = Value::undefined();
        assert!(value.is_undefined());
        assert!(value.is_nil());
        assert_eq!(value.to_text(), "");
        assert_eq!(value.to_json().unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn test_typed_nil_is_kept() {
        let value = Value::new(None::<Vec<u8>>);
        assert!(value.is_nil());
        assert!(!value.is_undefined());
        assert_eq!(value.downcast_ref::<Option<Vec<u8>>>(), Some(&None));
    }

    #[test]
    fn test_runtime_desc_of_dynamic() {
        let value = Value::new(serde_json::json!([1, 2]));
        assert_eq!(value.declared_desc(), &TypeDesc::Any);
        assert!(value.runtime_desc().is_marshaling());
    }

    #[test]
    fn test_serde() {
        let value = Value::new(vec![1_u8, 2]);
        assert_eq!(serde_json::to_string(&value).unwrap(), "[1,2]");

        let back: Value = serde_json::from_str(r#"{"a":true}"#).unwrap();
        assert_eq!(back.to_json().unwrap(), serde_json::json!({ "a": true }));
    }

    #[derive(Serialize, Deserialize)]
    struct Car {
        make: String,
        doors: u8,
    }
    crate::describe_struct!(Car { make: String, doors: u8 });

    #[test]
    fn test_json_keeps_field_order_and_f32_digits() {
        let car = Value::new(Car {
            make: "vw".into(),
            doors: 3,
        });
        assert_eq!(car.to_json_string().unwrap(), r#"{"make":"vw","doors":3}"#);
        assert_eq!(serde_json::to_string(&car).unwrap(), r#"{"make":"vw","doors":3}"#);

        let floats = Value::new(vec![0.1_f32, 2.5]);
        assert_eq!(floats.to_json_string().unwrap(), "[0.1,2.5]");
        assert_eq!(serde_json::to_string(&floats).unwrap(), "[0.1,2.5]");
        assert_eq!(Value::undefined().to_json_string().unwrap(), "null");
    }

    #[test]
    fn test_json_value_from_typed() {
        let value = Value::new(7_i32);
        let json = <serde_json::Value as DataType>::from_value(value).unwrap();
        assert_eq!(json, serde_json::json!(7));
    }
}
