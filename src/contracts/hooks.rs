//! Before, after and unknown transaction hooks.

use std::fmt;

use crate::types::{TypeDesc, Value};

use super::function::ContractFunction;
use super::{ContextInterface, ContractError, RegistrationError};

/// Role a hook plays in the invocation lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransactionHandlerKind {
    /// Runs before the named function
    Before,
    /// Runs when no function matches the name
    Unknown,
    /// Runs after the named or unknown function
    After,
}

impl TransactionHandlerKind {
    /// Function name the hook is registered under
    #[must_use]
    pub const fn function_name(self) -> &'static str {
        match self {
            Self::Before => "BeforeTransaction",
            Self::Unknown => "UnknownTransaction",
            Self::After => "AfterTransaction",
        }
    }
}

impl fmt::Display for TransactionHandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Before => "Before",
            Self::Unknown => "Unknown",
            Self::After => "After",
        })
    }
}

/// A contract function in a hook role.
///
/// Before and unknown hooks take only the context. An after hook may also
/// take a single [`Value`], which receives the named function's raw success
/// value.
#[derive(Debug)]
pub struct TransactionHandler<C> {
    function: ContractFunction<C>,
    kind: TransactionHandlerKind,
}

impl<C: ContextInterface> TransactionHandler<C> {
    /// Check `function` against the restrictions of `kind`
    pub fn new(
        function: ContractFunction<C>,
        kind: TransactionHandlerKind,
    ) -> Result<Self, RegistrationError> {
        let params: Vec<&TypeDesc> = function.param_types().collect();
        match kind {
            TransactionHandlerKind::Before | TransactionHandlerKind::Unknown => {
                if !params.is_empty() {
                    return Err(RegistrationError::HookTakesParams { kind });
                }
            }
            TransactionHandlerKind::After => match params.as_slice() {
                [] | [TypeDesc::Any] => {}
                [_] => return Err(RegistrationError::AfterParamType),
                _ => return Err(RegistrationError::AfterTooManyParams),
            },
        }
        Ok(Self { function, kind })
    }

    /// Hook role
    #[must_use]
    pub const fn kind(&self) -> TransactionHandlerKind {
        self.kind
    }

    /// The wrapped function
    #[must_use]
    pub const fn function(&self) -> &ContractFunction<C> {
        &self.function
    }

    /// Run the hook. `data` is only passed to an after hook that asked for it.
    pub fn call(&self, ctx: &mut C, data: Option<Value>) -> Result<(String, Value), ContractError> {
        let params = if self.function.param_types().next().is_some() {
            vec![data.unwrap_or_else(Value::undefined)]
        } else {
            Vec::new()
        };
        self.function.call_values(ctx, params)
    }
}
