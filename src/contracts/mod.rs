//! Contract routing and invocation.
//!
//! This module maps an inbound `namespace:function` invocation onto a
//! registered contract function, converts the wire arguments into typed
//! values, calls the function and turns its result into a response.
//!
//! ## Architecture
//!
//! 1. **Handlers**: closures and `fn` items become erased callables together
//!    with a [`handler::Signature`] and a per-parameter decoder chain
//! 2. **Functions**: [`ContractFunction`] inspects the signature once, at
//!    registration, and owns the argument codec and response handler
//! 3. **Hooks**: [`TransactionHandler`] wraps before, after and unknown
//!    functions and checks their restricted shapes
//! 4. **Contracts**: [`Contract`] groups functions under a namespace and runs
//!    the before → named-or-unknown → after lifecycle for each call
//! 5. **Chaincode**: [`ContractChaincode`] resolves the namespace and answers
//!    the transport
//!
//! ## Error tiers
//!
//! - [`RegistrationError`]: a contract is malformed. Startup must stop.
//! - [`ContractError`]: a single invocation failed. Its message is the
//!   failure payload and the chaincode keeps serving.
//! - A disagreement between a function's inspected signature and what a call
//!   actually produced is an internal bug and panics through
//!   [`invariant_violation`].

pub mod chaincode;
pub mod context;
pub mod contract;
pub mod function;
pub mod handler;
pub mod hooks;

use std::fmt;

use crate::metadata::SchemaError;
use crate::types::{ConversionError, TypeError};

pub use chaincode::{Chaincode, ChaincodeBuilder, ContractChaincode, SYSTEM_CONTRACT_NAME};
pub use context::{ContextInterface, TransactionContext};
pub use contract::{Contract, ContractBuilder, ContractInterface, Phase};
pub use function::{ContractFunction, ReturnShape};
pub use handler::{ArgumentSet, Handler, IntoOutputs, Output, Parameter, Signature};
pub use hooks::{TransactionHandler, TransactionHandlerKind};

/// Error returned by user contract code
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type for invocations
pub type ContractResult<T> = Result<T, ContractError>;

/// Invocation-time errors
#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    /// Namespace is not registered
    #[error("Contract not found with name {0}")]
    ContractNotFound(String),

    /// Nothing after the namespace separator
    #[error("Blank function name passed")]
    BlankFunctionName,

    /// No such function and no unknown handler
    #[error("Function {function} not found in contract {contract}")]
    FunctionNotFound {
        /// Requested function
        function: String,
        /// Namespace searched
        contract: String,
    },

    /// Supplementary metadata disagrees with the registered signature
    #[error("Incorrect number of params in supplementary metadata. Expected {expected}, received {received}")]
    MetadataParamCount {
        /// Registered parameter count
        expected: usize,
        /// Parameters described by the metadata
        received: usize,
    },

    /// Too few wire arguments
    #[error("Incorrect number of params. Expected {expected}, received {received}")]
    ParamCount {
        /// Registered parameter count
        expected: usize,
        /// Wire arguments supplied
        received: usize,
    },

    /// Scalar conversion failed
    #[error(transparent)]
    Conversion(#[from] ConversionError),

    /// Composite argument is not valid JSON for its type
    #[error("Value {value} was not passed in expected format {type_name}")]
    Format {
        /// Raw wire string
        value: String,
        /// Target type
        type_name: String,
    },

    /// Argument type cannot be decoded at all
    #[error(transparent)]
    Type(#[from] TypeError),

    /// Supplementary schema is unusable
    #[error("Invalid schema for parameter \"{param}\": {source}")]
    InvalidSchema {
        /// Parameter name from the metadata
        param: String,
        /// What is wrong with it
        source: SchemaError,
    },

    /// Argument does not satisfy its schema
    #[error("Value passed for parameter \"{param}\" did not match schema:\n{violations}")]
    ParamSchema {
        /// Parameter name from the metadata
        param: String,
        /// Numbered violation list
        violations: String,
    },

    /// Success value could not be rendered or validated
    #[error("Error handling success response. {0}")]
    SuccessResponse(String),

    /// Error returned by the contract function itself
    #[error("{0}")]
    Transaction(BoxError),
}

impl ContractError {
    /// Wrap an error returned by contract code
    pub fn transaction(err: impl Into<BoxError>) -> Self {
        Self::Transaction(err.into())
    }
}

/// Registration-time errors. A contract that fails registration must not be
/// served.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    /// Context parameter appears after position one
    #[error("Functions requiring the TransactionContext must require it as the first parameter. {function} takes it in as parameter {position}")]
    ContextPosition {
        /// Function name
        function: String,
        /// 1-based position found
        position: usize,
    },

    /// A parameter type is outside the data model
    #[error("{function} contains invalid parameter type. {source}")]
    InvalidParameter {
        /// Function name
        function: String,
        /// Validator diagnostic
        source: TypeError,
    },

    /// The only return type is outside the data model
    #[error("{function} contains invalid single return type. {source}")]
    InvalidSingleReturn {
        /// Function name
        function: String,
        /// Validator diagnostic
        source: TypeError,
    },

    /// First of two return types is outside the data model
    #[error("{function} contains invalid first return type. {source}")]
    InvalidFirstReturn {
        /// Function name
        function: String,
        /// Validator diagnostic
        source: TypeError,
    },

    /// Second of two return types is not the error slot
    #[error("{function} contains invalid second return type. Type {type_name} is not valid. Expected error")]
    InvalidSecondReturn {
        /// Function name
        function: String,
        /// Type found
        type_name: String,
    },

    /// More than a success value and an error
    #[error("Functions may only return a maximum of two values. {function} returns {count}")]
    TooManyReturns {
        /// Function name
        function: String,
        /// Declared return count
        count: usize,
    },

    /// Before or unknown hook declares parameters
    #[error("{kind} transactions may not take any params other than the transaction context")]
    HookTakesParams {
        /// Hook role
        kind: TransactionHandlerKind,
    },

    /// After hook declares more than one parameter
    #[error("After transactions must take at most one non-context param")]
    AfterTooManyParams,

    /// After hook's parameter is not the dynamic type
    #[error("After transaction must take type Value as their only non-context param")]
    AfterParamType,

    /// Hook role already filled
    #[error("{kind} transaction already registered in contract {contract}")]
    DuplicateHook {
        /// Hook role
        kind: TransactionHandlerKind,
        /// Contract name
        contract: String,
    },

    /// Function name reused within a contract
    #[error("Function {function} already registered in contract {contract}")]
    DuplicateFunction {
        /// Function name
        function: String,
        /// Contract name
        contract: String,
    },

    /// Empty function name
    #[error("Function names must not be blank in contract {0}")]
    BlankFunctionName(String),

    /// Empty contract name
    #[error("Contract names must not be blank")]
    BlankContractName,

    /// Namespace used twice
    #[error("Multiple contracts being merged into chaincode with name {0}")]
    DuplicateContract(String),

    /// Chaincode built without contracts
    #[error("Chaincode must contain at least one contract")]
    NoContracts,

    /// Configured default namespace is not registered
    #[error("Default contract {0} is not registered")]
    UnknownDefault(String),

    /// Supplementary metadata could not be loaded or served
    #[error("Failed to prepare metadata: {0}")]
    Metadata(String),

    /// A handler's decoder chain disagrees with its signature
    #[error("{function} declares {declared} parameter decoders for {expected} parameters")]
    DecoderMismatch {
        /// Function name
        function: String,
        /// Decoders supplied
        declared: usize,
        /// Parameters inspected
        expected: usize,
    },
}

/// Abort on an internal consistency bug.
///
/// Reached only when what a call produced disagrees with what registration
/// inspected, never because of caller input.
#[track_caller]
pub fn invariant_violation(detail: impl fmt::Display) -> ! {
    panic!("internal invariant violated: {detail}")
}
