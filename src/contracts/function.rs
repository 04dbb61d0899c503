//! Contract function descriptors.
//!
//! A [`ContractFunction`] is built once per registered function. Building it
//! inspects the declared signature and rejects shapes outside the data model;
//! afterwards the descriptor owns the two conversions every call goes
//! through: wire strings into typed arguments, and produced values back into
//! a response string.

use tracing::{debug, trace};

use crate::metadata::schema::violations_to_string;
use crate::metadata::{ComponentMetadata, Schema, TransactionMetadata};
use crate::types::{check_array_lengths, validate, TypeDesc, TypeError, Value};

use super::handler::{ArgumentSet, Handler, Output, Parameter, Signature};
use super::{invariant_violation, ContextInterface, ContractError, RegistrationError};

/// Type-erased call target
pub type Callable<C> = Box<dyn for<'c> Fn(ArgumentSet<'c, C>) -> Vec<Output> + Send + Sync>;

/// What a function returns
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReturnShape {
    /// Success value type, if any
    pub success: Option<TypeDesc>,
    /// Whether a trailing error slot is declared
    pub error: bool,
}

impl ReturnShape {
    /// Number of produced values a call must yield
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.success.is_some()) + usize::from(self.error)
    }

    /// Whether the function returns nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A registered, inspected contract function
pub struct ContractFunction<C> {
    name: String,
    callable: Callable<C>,
    uses_context: bool,
    params: Vec<Parameter>,
    returns: ReturnShape,
}

impl<C: ContextInterface> ContractFunction<C> {
    /// Inspect `handler` and build its descriptor
    pub fn new<M, H: Handler<C, M>>(name: &str, handler: H) -> Result<Self, RegistrationError> {
        let callable: Callable<C> = Box::new(move |args: ArgumentSet<'_, C>| handler.invoke(args));
        Self::from_parts(
            name,
            &H::signature(),
            Some(&C::type_desc()),
            H::parameters(),
            callable,
        )
    }

    /// Build a descriptor from an explicit signature.
    ///
    /// `context` is the type that marks the context parameter. `parameters`
    /// must list the non-context parameters in declaration order.
    pub fn from_parts(
        name: &str,
        signature: &Signature,
        context: Option<&TypeDesc>,
        parameters: Vec<Parameter>,
        callable: Callable<C>,
    ) -> Result<Self, RegistrationError> {
        let (uses_context, param_types) = describe_parameters(name, &signature.inputs, context)?;
        let returns = describe_returns(name, &signature.outputs)?;

        let decoders_match = param_types.len() == parameters.len()
            && param_types
                .iter()
                .zip(&parameters)
                .all(|(desc, param)| desc == param.desc());
        if !decoders_match {
            return Err(RegistrationError::DecoderMismatch {
                function: name.to_string(),
                declared: parameters.len(),
                expected: param_types.len(),
            });
        }

        debug!(
            function = name,
            params = parameters.len(),
            uses_context,
            returns = returns.len(),
            "contract function inspected"
        );

        Ok(Self {
            name: name.to_string(),
            callable,
            uses_context,
            params: parameters,
            returns,
        })
    }

    /// Function name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-context parameter types
    pub fn param_types(&self) -> impl Iterator<Item = &TypeDesc> {
        self.params.iter().map(Parameter::desc)
    }

    /// Declared return shape
    #[must_use]
    pub const fn returns(&self) -> &ReturnShape {
        &self.returns
    }

    /// Whether the function takes the context
    #[must_use]
    pub const fn uses_context(&self) -> bool {
        self.uses_context
    }

    /// Decode `params`, call, and handle the response
    pub fn call(
        &self,
        ctx: &mut C,
        metadata: Option<&TransactionMetadata>,
        components: Option<&ComponentMetadata>,
        params: &[String],
    ) -> Result<(String, Value), ContractError> {
        let args = self.format_args(ctx, metadata, components, params)?;
        let outputs = (self.callable)(args);
        self.handle_response(outputs, metadata, components)
    }

    /// Call with already typed arguments, bypassing the codec
    pub fn call_values(
        &self,
        ctx: &mut C,
        params: Vec<Value>,
    ) -> Result<(String, Value), ContractError> {
        let args = ArgumentSet {
            context: self.uses_context.then_some(ctx),
            params,
        };
        let outputs = (self.callable)(args);
        self.handle_response(outputs, None, None)
    }

    /// Convert wire strings into the argument set for a call.
    ///
    /// Scalars go through the basic-type conversion, dynamic parameters
    /// receive the raw string and everything else is decoded from JSON. With
    /// metadata, each decoded value is also checked against its schema.
    /// Surplus wire arguments are ignored.
    pub fn format_args<'c>(
        &self,
        ctx: &'c mut C,
        metadata: Option<&TransactionMetadata>,
        components: Option<&ComponentMetadata>,
        params: &[String],
    ) -> Result<ArgumentSet<'c, C>, ContractError> {
        if let Some(metadata) = metadata {
            if metadata.parameters.len() != self.params.len() {
                return Err(ContractError::MetadataParamCount {
                    expected: self.params.len(),
                    received: metadata.parameters.len(),
                });
            }
        }

        if params.len() < self.params.len() {
            return Err(ContractError::ParamCount {
                expected: self.params.len(),
                received: params.len(),
            });
        }

        let mut values = Vec::with_capacity(self.params.len());
        for (i, (param, raw)) in self.params.iter().zip(params).enumerate() {
            let value = decode_param(param, raw)?;
            if let Some(metadata) = metadata {
                let meta = &metadata.parameters[i];
                let json = value
                    .to_json()
                    .map_err(|e| ContractError::Format {
                        value: raw.clone(),
                        type_name: format!("{} ({e})", param.desc()),
                    })?;
                let violations = Schema::compile(&meta.schema, components)
                    .map_err(|source| ContractError::InvalidSchema {
                        param: meta.name.clone(),
                        source,
                    })?
                    .validate(&json);
                if !violations.is_empty() {
                    return Err(ContractError::ParamSchema {
                        param: meta.name.clone(),
                        violations: violations_to_string(&violations),
                    });
                }
            }
            values.push(value);
        }

        trace!(function = %self.name, args = values.len(), "arguments decoded");

        Ok(ArgumentSet {
            context: self.uses_context.then_some(ctx),
            params: values,
        })
    }

    /// Turn what a call produced into `(payload, raw value)`.
    ///
    /// An error from the function wins over everything else. A nil success
    /// value renders as the empty string. Struct, collection and nillable
    /// struct values render as JSON, others as plain text.
    ///
    /// # Panics
    /// Panics when `outputs` does not match the inspected return shape
    pub fn handle_response(
        &self,
        outputs: Vec<Output>,
        metadata: Option<&TransactionMetadata>,
        components: Option<&ComponentMetadata>,
    ) -> Result<(String, Value), ContractError> {
        if outputs.len() != self.returns.len() {
            invariant_violation(format_args!(
                "{} declared {} return values but produced {}",
                self.name,
                self.returns.len(),
                outputs.len()
            ));
        }

        let mut outputs = outputs.into_iter();
        let success = if self.returns.success.is_some() {
            match outputs.next() {
                Some(Output::Value(value)) => Some(value),
                _ => invariant_violation(format_args!(
                    "{} produced no value in its success slot",
                    self.name
                )),
            }
        } else {
            None
        };

        if self.returns.error {
            match outputs.next() {
                Some(Output::Error(Some(err))) => return Err(ContractError::Transaction(err)),
                Some(Output::Error(None)) => {}
                _ => invariant_violation(format_args!(
                    "{} produced no value in its error slot",
                    self.name
                )),
            }
        }

        let (Some(desc), Some(value)) = (&self.returns.success, success) else {
            return Ok((String::new(), Value::undefined()));
        };

        if value.is_nil() {
            return Ok((String::new(), value));
        }

        let marshal = desc.is_marshaling()
            || (*desc == TypeDesc::Any && value.runtime_desc().is_marshaling());
        let text = if marshal {
            value
                .to_json_string()
                .map_err(|e| ContractError::SuccessResponse(e.to_string()))?
        } else {
            value.to_text()
        };

        if let Some(returns) = metadata.and_then(|m| m.returns.as_ref()) {
            let json = value
                .to_json()
                .map_err(|e| ContractError::SuccessResponse(e.to_string()))?;
            let violations = Schema::compile(&returns.schema, components)
                .map_err(|e| ContractError::SuccessResponse(format!("Invalid schema: {e}")))?
                .validate(&json);
            if !violations.is_empty() {
                return Err(ContractError::SuccessResponse(format!(
                    "Value did not match schema:\n{}",
                    violations_to_string(&violations)
                )));
            }
        }

        Ok((text, value))
    }
}

impl<C> std::fmt::Debug for ContractFunction<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractFunction")
            .field("name", &self.name)
            .field("uses_context", &self.uses_context)
            .field("params", &self.params)
            .field("returns", &self.returns)
            .finish_non_exhaustive()
    }
}

fn decode_param(param: &Parameter, raw: &str) -> Result<Value, ContractError> {
    match param.desc() {
        TypeDesc::Basic(kind) => Ok(kind.convert(raw)?),
        TypeDesc::Any => Ok(Value::new(serde_json::Value::String(raw.to_string()))),
        desc => {
            check_array_lengths(desc)?;
            param.decode_json(raw).map_err(|_| ContractError::Format {
                value: raw.to_string(),
                type_name: desc.to_string(),
            })
        }
    }
}

/// Split declared inputs into context usage and non-context parameter types.
///
/// The context may only appear first. Every other parameter must be in the
/// data model, with the context type as the only allow-listed extra.
pub fn describe_parameters(
    function: &str,
    inputs: &[TypeDesc],
    context: Option<&TypeDesc>,
) -> Result<(bool, Vec<TypeDesc>), RegistrationError> {
    let additional = context.map(std::slice::from_ref).unwrap_or_default();
    let mut uses_context = false;
    let mut params = Vec::with_capacity(inputs.len());

    for (i, desc) in inputs.iter().enumerate() {
        if context == Some(desc) {
            if i != 0 {
                return Err(RegistrationError::ContextPosition {
                    function: function.to_string(),
                    position: i + 1,
                });
            }
            uses_context = true;
            continue;
        }

        validate(desc, additional).map_err(|source| RegistrationError::InvalidParameter {
            function: function.to_string(),
            source,
        })?;
        params.push(desc.clone());
    }

    Ok((uses_context, params))
}

/// Classify declared outputs into a [`ReturnShape`].
///
/// Allowed shapes are nothing, a single value or error, or a value followed
/// by an error.
pub fn describe_returns(
    function: &str,
    outputs: &[TypeDesc],
) -> Result<ReturnShape, RegistrationError> {
    match outputs {
        [] => Ok(ReturnShape::default()),
        [TypeDesc::Error] => Ok(ReturnShape {
            success: None,
            error: true,
        }),
        [single] => {
            validate(single, &[]).map_err(|source| RegistrationError::InvalidSingleReturn {
                function: function.to_string(),
                source,
            })?;
            Ok(ReturnShape {
                success: Some(single.clone()),
                error: false,
            })
        }
        [first, second] => {
            validate(first, &[]).map_err(|source: TypeError| {
                RegistrationError::InvalidFirstReturn {
                    function: function.to_string(),
                    source,
                }
            })?;
            if *second != TypeDesc::Error {
                return Err(RegistrationError::InvalidSecondReturn {
                    function: function.to_string(),
                    type_name: second.to_string(),
                });
            }
            Ok(ReturnShape {
                success: Some(first.clone()),
                error: true,
            })
        }
        _ => Err(RegistrationError::TooManyReturns {
            function: function.to_string(),
            count: outputs.len(),
        }),
    }
}
