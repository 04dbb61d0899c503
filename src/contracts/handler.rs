//! Turning closures and `fn` items into callable contract functions.
//!
//! [`Handler`] is implemented for every `Fn` of up to six [`DataType`]
//! parameters, with or without a leading `&mut C` context, whose return type
//! implements [`IntoOutputs`]. Each implementation reports the function's
//! [`Signature`] and a decoder per parameter so that registration can inspect
//! the shape once and invocation can stay untyped.

use crate::types::{DataType, TypeDesc, Value};

use super::{invariant_violation, BoxError, ContextInterface};

/// Marker for handlers that do not take the context
pub struct NoContext;

/// Marker for handlers whose first parameter is `&mut C`
pub struct WithContext;

/// Declared parameter and return types of a function
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    /// Parameter types, the context included
    pub inputs: Vec<TypeDesc>,
    /// Return types, the error slot included
    pub outputs: Vec<TypeDesc>,
}

type JsonDecoder = fn(&str) -> Result<Value, serde_json::Error>;

/// A non-context parameter: its type and how to decode it from JSON
#[derive(Clone)]
pub struct Parameter {
    desc: TypeDesc,
    decode_json: JsonDecoder,
}

impl Parameter {
    /// Parameter of type `T`
    #[must_use]
    pub fn of<T: DataType>() -> Self {
        Self {
            desc: T::type_desc(),
            decode_json: decode_json::<T>,
        }
    }

    /// Declared type
    #[must_use]
    pub const fn desc(&self) -> &TypeDesc {
        &self.desc
    }

    /// Decode a composite argument from its JSON text
    pub fn decode_json(&self, raw: &str) -> Result<Value, serde_json::Error> {
        (self.decode_json)(raw)
    }
}

impl std::fmt::Debug for Parameter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Parameter").field(&self.desc).finish()
    }
}

fn decode_json<T: DataType>(raw: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str::<T>(raw).map(Value::new)
}

/// Everything a call needs: the context, when the function takes one, and
/// the decoded non-context arguments in order.
pub struct ArgumentSet<'c, C> {
    /// Present only for context-consuming functions
    pub context: Option<&'c mut C>,
    /// Decoded arguments
    pub params: Vec<Value>,
}

/// One produced return value
#[derive(Debug)]
pub enum Output {
    /// A success value
    Value(Value),
    /// The error slot, `None` when the call succeeded
    Error(Option<BoxError>),
}

/// Return types a contract function may have
pub trait IntoOutputs: 'static {
    /// Declared return types
    fn describe() -> Vec<TypeDesc>;

    /// Split into produced values, one per declared type
    fn into_outputs(self) -> Vec<Output>;
}

impl IntoOutputs for () {
    fn describe() -> Vec<TypeDesc> {
        Vec::new()
    }

    fn into_outputs(self) -> Vec<Output> {
        Vec::new()
    }
}

impl<T: DataType> IntoOutputs for T {
    fn describe() -> Vec<TypeDesc> {
        vec![T::type_desc()]
    }

    fn into_outputs(self) -> Vec<Output> {
        vec![Output::Value(Value::new(self))]
    }
}

impl<E> IntoOutputs for Result<(), E>
where
    E: Into<BoxError> + 'static,
{
    fn describe() -> Vec<TypeDesc> {
        vec![TypeDesc::Error]
    }

    fn into_outputs(self) -> Vec<Output> {
        vec![Output::Error(self.err().map(Into::into))]
    }
}

impl<T, E> IntoOutputs for Result<T, E>
where
    T: DataType,
    E: Into<BoxError> + 'static,
{
    fn describe() -> Vec<TypeDesc> {
        vec![T::type_desc(), TypeDesc::Error]
    }

    fn into_outputs(self) -> Vec<Output> {
        match self {
            Ok(value) => vec![Output::Value(Value::new(value)), Output::Error(None)],
            Err(e) => vec![
                Output::Value(Value::absent(T::type_desc())),
                Output::Error(Some(e.into())),
            ],
        }
    }
}

// Tuples declare several success values. Registration rejects them; they
// exist so that shape is expressible.
impl<A: DataType, B: DataType> IntoOutputs for (A, B) {
    fn describe() -> Vec<TypeDesc> {
        vec![A::type_desc(), B::type_desc()]
    }

    fn into_outputs(self) -> Vec<Output> {
        vec![Output::Value(Value::new(self.0)), Output::Value(Value::new(self.1))]
    }
}

impl<A: DataType, B: DataType, D: DataType> IntoOutputs for (A, B, D) {
    fn describe() -> Vec<TypeDesc> {
        vec![A::type_desc(), B::type_desc(), D::type_desc()]
    }

    fn into_outputs(self) -> Vec<Output> {
        vec![
            Output::Value(Value::new(self.0)),
            Output::Value(Value::new(self.1)),
            Output::Value(Value::new(self.2)),
        ]
    }
}

/// A function usable as a contract function or hook.
///
/// `M` is a marker that keeps the implementations for different arities and
/// context usage apart.
pub trait Handler<C, M>: Send + Sync + 'static {
    /// Declared parameter and return types
    fn signature() -> Signature
    where
        Self: Sized;

    /// Decoders for the non-context parameters
    fn parameters() -> Vec<Parameter>
    where
        Self: Sized;

    /// Call with already decoded arguments
    fn invoke(&self, args: ArgumentSet<'_, C>) -> Vec<Output>;
}

fn take_param<T: DataType>(params: &mut impl Iterator<Item = Value>) -> T {
    let value = params
        .next()
        .unwrap_or_else(|| invariant_violation("argument list shorter than the declared parameters"));
    let desc = value.declared_desc().to_string();
    T::from_value(value).unwrap_or_else(|| {
        invariant_violation(format_args!(
            "argument of type {desc} passed for parameter of type {}",
            T::type_desc()
        ))
    })
}

macro_rules! impl_handler {
    ($($param:ident),*) => {
        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<C, F, R, $($param,)*> Handler<C, (NoContext, $($param,)*)> for F
        where
            C: ContextInterface,
            F: Fn($($param),*) -> R + Send + Sync + 'static,
            R: IntoOutputs,
            $($param: DataType,)*
        {
            fn signature() -> Signature {
                Signature {
                    inputs: vec![$($param::type_desc()),*],
                    outputs: R::describe(),
                }
            }

            fn parameters() -> Vec<Parameter> {
                vec![$(Parameter::of::<$param>()),*]
            }

            fn invoke(&self, args: ArgumentSet<'_, C>) -> Vec<Output> {
                let mut params = args.params.into_iter();
                $(let $param = take_param::<$param>(&mut params);)*
                (self)($($param),*).into_outputs()
            }
        }

        #[allow(non_snake_case, unused_mut, unused_variables)]
        impl<C, F, R, $($param,)*> Handler<C, (WithContext, $($param,)*)> for F
        where
            C: ContextInterface,
            F: Fn(&mut C, $($param),*) -> R + Send + Sync + 'static,
            R: IntoOutputs,
            $($param: DataType,)*
        {
            fn signature() -> Signature {
                Signature {
                    inputs: vec![C::type_desc(), $($param::type_desc()),*],
                    outputs: R::describe(),
                }
            }

            fn parameters() -> Vec<Parameter> {
                vec![$(Parameter::of::<$param>()),*]
            }

            fn invoke(&self, args: ArgumentSet<'_, C>) -> Vec<Output> {
                let ctx = args
                    .context
                    .unwrap_or_else(|| invariant_violation("context-consuming function called without a context"));
                let mut params = args.params.into_iter();
                $(let $param = take_param::<$param>(&mut params);)*
                (self)(ctx, $($param),*).into_outputs()
            }
        }
    };
}

impl_handler!();
impl_handler!(T1);
impl_handler!(T1, T2);
impl_handler!(T1, T2, T3);
impl_handler!(T1, T2, T3, T4);
impl_handler!(T1, T2, T3, T4, T5);
impl_handler!(T1, T2, T3, T4, T5, T6);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::TransactionContext;
    use crate::shim::ChaincodeStub;
    use crate::types::BasicKind;

    fn signature_of<M, H: Handler<TransactionContext, M>>(_handler: &H) -> Signature {
        H::signature()
    }

    fn context_desc() -> TypeDesc {
        TransactionContext::type_desc()
    }

    #[test]
    fn test_signatures() {
        let sig = signature_of(&|| {});
        assert!(sig.inputs.is_empty());
        assert!(sig.outputs.is_empty());

        let sig = signature_of(&|_: &mut TransactionContext, a: String, b: i32| -> Result<u64, String> {
            Ok(a.len() as u64 + b.unsigned_abs() as u64)
        });
        assert_eq!(
            sig.inputs,
            vec![
                context_desc(),
                TypeDesc::Basic(BasicKind::String),
                TypeDesc::Basic(BasicKind::I32),
            ]
        );
        assert_eq!(sig.outputs, vec![TypeDesc::Basic(BasicKind::U64), TypeDesc::Error]);

        let sig = signature_of(&|| -> Result<(), String> { Ok(()) });
        assert_eq!(sig.outputs, vec![TypeDesc::Error]);

        let sig = signature_of(&|| (1_i32, true));
        assert_eq!(sig.outputs.len(), 2);
    }

    #[test]
    fn test_invoke_without_context() {
        let add = |a: i32, b: i32| a + b;
        let args = ArgumentSet::<'_, TransactionContext> {
            context: None,
            params: vec![Value::new(2_i32), Value::new(3_i32)],
        };
        let outputs = Handler::<TransactionContext, (NoContext, i32, i32)>::invoke(&add, args);
        match outputs.as_slice() {
            [Output::Value(v)] => assert_eq!(v.downcast_ref::<i32>(), Some(&5)),
            other => panic!("unexpected outputs {other:?}"),
        }
    }

    #[test]
    fn test_invoke_with_context() {
        let tx_id = |ctx: &mut TransactionContext| -> Result<String, String> {
            Ok(ctx.get_stub().tx_id())
        };
        let stub = std::sync::Arc::new(crate::shim::MockStub::new("Id", vec![]));
        let expected = stub.tx_id();
        let mut ctx = TransactionContext::default();
        ctx.set_stub(stub);

        let args = ArgumentSet {
            context: Some(&mut ctx),
            params: Vec::new(),
        };
        let outputs = Handler::<TransactionContext, (WithContext,)>::invoke(&tx_id, args);
        match outputs.as_slice() {
            [Output::Value(v), Output::Error(None)] => {
                assert_eq!(v.downcast_ref::<String>(), Some(&expected));
            }
            other => panic!("unexpected outputs {other:?}"),
        }
    }

    #[test]
    fn test_error_output() {
        let outputs = Err::<i32, _>("boom".to_string()).into_outputs();
        match outputs.as_slice() {
            [Output::Value(v), Output::Error(Some(e))] => {
                assert!(v.is_undefined());
                assert_eq!(v.declared_desc(), &TypeDesc::Basic(BasicKind::I32));
                assert_eq!(e.to_string(), "boom");
            }
            other => panic!("unexpected outputs {other:?}"),
        }
    }

    #[test]
    fn test_json_decoder() {
        let param = Parameter::of::<Vec<u8>>();
        let value = param.decode_json("[1,2,3]").unwrap();
        assert_eq!(value.downcast_ref::<Vec<u8>>(), Some(&vec![1, 2, 3]));
        assert!(param.decode_json("[1,").is_err());
    }
}
