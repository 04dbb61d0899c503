//! # Chaincode Router
//!
//! Contract routing and invocation for Hyperledger Fabric style chaincode.
//!
//! ## Architecture
//!
//! An invocation arrives as a `namespace:function` name plus string
//! arguments. The router:
//! - Resolves the namespace to a registered contract (or the default one)
//! - Converts each argument into the declared parameter type
//! - Runs the before hook, the named function (or the unknown hook), then
//!   the after hook, all sharing one transaction context
//! - Renders the success value as text or JSON, or reports the error
//!
//! ## Data model
//!
//! Functions may only use the types of [`types`]: registry scalars, arrays,
//! `Vec`s, string-keyed maps, described structs and the dynamic
//! [`types::Value`]. Shapes outside the model are rejected when the contract
//! is registered, never at call time.

#![forbid(unsafe_code)]
#![deny(clippy::all, rust_2018_idioms)]
#![warn(clippy::pedantic, clippy::nursery, missing_docs)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::too_many_lines,
    // Registry integer widths are checked before narrowing
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    // Const fn not always beneficial for complex types
    clippy::missing_const_for_fn,
    // must_use on every fn is excessive
    clippy::must_use_candidate,
    // Handlers and configs are taken by value on purpose
    clippy::needless_pass_by_value,
    // Erased callables are spelled out once, behind an alias
    clippy::type_complexity,
    // Match arms with same body are sometimes clearer separate
    clippy::match_same_arms
)]

pub mod config;
pub mod contracts;
pub mod metadata;
pub mod shim;
pub mod types;

pub use config::{ChaincodeConfig, ConfigError};
pub use contracts::{
    Chaincode, Contract, ContractChaincode, ContractError, ContractInterface, RegistrationError,
    TransactionContext, SYSTEM_CONTRACT_NAME,
};
pub use metadata::ContractChaincodeMetadata;
pub use shim::{ChaincodeStub, MockStub, Response};
pub use types::{DataType, TypeDesc, Value};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
