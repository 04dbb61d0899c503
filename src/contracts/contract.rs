//! Contracts: named groups of functions plus their lifecycle hooks.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, error};

use crate::metadata::{
    ComponentMetadata, ContractChaincodeMetadata, ContractMetadata, InfoMetadata,
    TransactionMetadata,
};
use crate::shim::ChaincodeStub;
use crate::types::Value;

use super::function::ContractFunction;
use super::handler::Handler;
use super::hooks::{TransactionHandler, TransactionHandlerKind};
use super::{ContextInterface, ContractError, RegistrationError};

/// Lifecycle phase of one invocation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Context created, nothing run yet
    Start,
    /// Running the before hook
    BeforeRun,
    /// Running the named function or the unknown hook
    Dispatch,
    /// Running the after hook
    AfterRun,
    /// Finished
    Done,
}

/// Object-safe view of a contract, independent of its context type
pub trait ContractInterface: Send + Sync {
    /// Namespace the contract is routed under
    fn name(&self) -> &str;

    /// Contract information
    fn info(&self) -> Option<&InfoMetadata>;

    /// Whether the contract asked to receive unqualified invocations
    fn is_default(&self) -> bool;

    /// Describe the contract, registering shared schemas in `components`
    fn metadata(&self, components: &mut ComponentMetadata) -> ContractMetadata;

    /// Run `function` through the full lifecycle.
    ///
    /// `metadata` is the supplementary document, if one is in use.
    fn invoke(
        &self,
        stub: Arc<dyn ChaincodeStub>,
        function: &str,
        params: &[String],
        metadata: Option<&ContractChaincodeMetadata>,
    ) -> Result<String, ContractError>;
}

/// A contract bound to context type `C`
#[derive(Debug)]
pub struct Contract<C> {
    name: String,
    info: Option<InfoMetadata>,
    default: bool,
    functions: BTreeMap<String, ContractFunction<C>>,
    before: Option<TransactionHandler<C>>,
    unknown: Option<TransactionHandler<C>>,
    after: Option<TransactionHandler<C>>,
}

impl<C: ContextInterface> Contract<C> {
    /// Start building a contract routed under `name`
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ContractBuilder<C> {
        ContractBuilder {
            contract: Self {
                name: name.into(),
                info: None,
                default: false,
                functions: BTreeMap::new(),
                before: None,
                unknown: None,
                after: None,
            },
            error: None,
        }
    }

    /// Registered function names, sorted
    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    /// Registered function by name
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&ContractFunction<C>> {
        self.functions.get(name)
    }

    fn dispatch(
        &self,
        ctx: &mut C,
        function: &str,
        params: &[String],
        metadata: Option<&ContractChaincodeMetadata>,
    ) -> Result<(String, Value), ContractError> {
        if let Some(f) = self.functions.get(function) {
            let transaction = metadata.and_then(|m| m.transaction(&self.name, function));
            let components = metadata.map(|m| &m.components);
            return f.call(ctx, transaction, components, params);
        }

        match &self.unknown {
            Some(unknown) => {
                debug!(contract = %self.name, function, "Routing to unknown transaction handler");
                unknown.call(ctx, None)
            }
            None => Err(ContractError::FunctionNotFound {
                function: function.to_string(),
                contract: self.name.clone(),
            }),
        }
    }
}

impl<C: ContextInterface> ContractInterface for Contract<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn info(&self) -> Option<&InfoMetadata> {
        self.info.as_ref()
    }

    fn is_default(&self) -> bool {
        self.default
    }

    fn metadata(&self, components: &mut ComponentMetadata) -> ContractMetadata {
        let transactions = self
            .functions
            .values()
            .map(|f| {
                let params: Vec<_> = f.param_types().cloned().collect();
                TransactionMetadata::describe(
                    f.name(),
                    &params,
                    f.returns().success.as_ref(),
                    components,
                )
            })
            .collect();

        ContractMetadata {
            info: self.info.clone(),
            name: self.name.clone(),
            transactions,
            default: self.default,
        }
    }

    fn invoke(
        &self,
        stub: Arc<dyn ChaincodeStub>,
        function: &str,
        params: &[String],
        metadata: Option<&ContractChaincodeMetadata>,
    ) -> Result<String, ContractError> {
        let mut ctx = C::default();
        ctx.set_stub(stub);

        let mut phase = Phase::Start;
        let mut payload = String::new();
        let mut produced: Option<Value> = None;

        loop {
            debug!(contract = %self.name, function, ?phase, "Lifecycle phase");
            phase = match phase {
                Phase::Start => Phase::BeforeRun,
                Phase::BeforeRun => {
                    if let Some(before) = &self.before {
                        before.call(&mut ctx, None)?;
                    }
                    Phase::Dispatch
                }
                Phase::Dispatch => {
                    let (text, value) = self.dispatch(&mut ctx, function, params, metadata)?;
                    payload = text;
                    produced = Some(value);
                    Phase::AfterRun
                }
                Phase::AfterRun => {
                    if let Some(after) = &self.after {
                        after.call(&mut ctx, produced.take())?;
                    }
                    Phase::Done
                }
                Phase::Done => break,
            };
        }

        Ok(payload)
    }
}

/// Builder for [`Contract`].
///
/// Registration problems are kept until [`ContractBuilder::build`], which
/// reports the first one.
pub struct ContractBuilder<C> {
    contract: Contract<C>,
    error: Option<RegistrationError>,
}

impl<C: ContextInterface> ContractBuilder<C> {
    /// Attach contract information
    #[must_use]
    pub fn info(mut self, info: InfoMetadata) -> Self {
        self.contract.info = Some(info);
        self
    }

    /// Route invocations without a namespace to this contract
    #[must_use]
    pub fn default_contract(mut self) -> Self {
        self.contract.default = true;
        self
    }

    /// Register `handler` as function `name`
    #[must_use]
    pub fn function<M, H: Handler<C, M>>(mut self, name: &str, handler: H) -> Self {
        if self.error.is_some() {
            return self;
        }
        let result = self
            .check_function_name(name)
            .and_then(|()| ContractFunction::new(name, handler));
        match result {
            Ok(f) => {
                self.contract.functions.insert(name.to_string(), f);
            }
            Err(e) => self.fail(e),
        }
        self
    }

    /// Register the hook run before every function
    #[must_use]
    pub fn before<M, H: Handler<C, M>>(self, handler: H) -> Self {
        self.hook(TransactionHandlerKind::Before, handler)
    }

    /// Register the hook run when no function matches
    #[must_use]
    pub fn unknown<M, H: Handler<C, M>>(self, handler: H) -> Self {
        self.hook(TransactionHandlerKind::Unknown, handler)
    }

    /// Register the hook run after every function
    #[must_use]
    pub fn after<M, H: Handler<C, M>>(self, handler: H) -> Self {
        self.hook(TransactionHandlerKind::After, handler)
    }

    /// Finish the contract
    pub fn build(self) -> Result<Contract<C>, RegistrationError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.contract.name.trim().is_empty() {
            return Err(RegistrationError::BlankContractName);
        }

        debug!(
            contract = %self.contract.name,
            functions = self.contract.functions.len(),
            before = self.contract.before.is_some(),
            unknown = self.contract.unknown.is_some(),
            after = self.contract.after.is_some(),
            "Contract registered"
        );
        Ok(self.contract)
    }

    fn hook<M, H: Handler<C, M>>(mut self, kind: TransactionHandlerKind, handler: H) -> Self {
        if self.error.is_some() {
            return self;
        }

        let slot_taken = match kind {
            TransactionHandlerKind::Before => self.contract.before.is_some(),
            TransactionHandlerKind::Unknown => self.contract.unknown.is_some(),
            TransactionHandlerKind::After => self.contract.after.is_some(),
        };
        if slot_taken {
            let contract = self.contract.name.clone();
            self.fail(RegistrationError::DuplicateHook { kind, contract });
            return self;
        }

        let result = ContractFunction::new(kind.function_name(), handler)
            .and_then(|f| TransactionHandler::new(f, kind));
        match result {
            Ok(h) => {
                let slot = match kind {
                    TransactionHandlerKind::Before => &mut self.contract.before,
                    TransactionHandlerKind::Unknown => &mut self.contract.unknown,
                    TransactionHandlerKind::After => &mut self.contract.after,
                };
                *slot = Some(h);
            }
            Err(e) => self.fail(e),
        }
        self
    }

    fn check_function_name(&self, name: &str) -> Result<(), RegistrationError> {
        if name.trim().is_empty() {
            return Err(RegistrationError::BlankFunctionName(self.contract.name.clone()));
        }
        if self.contract.functions.contains_key(name) {
            return Err(RegistrationError::DuplicateFunction {
                function: name.to_string(),
                contract: self.contract.name.clone(),
            });
        }
        Ok(())
    }

    fn fail(&mut self, e: RegistrationError) {
        error!(contract = %self.contract.name, error = %e, "Contract registration failed");
        self.error = Some(e);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::contracts::TransactionContext;
    use crate::shim::MockStub;

    type TestContract = Contract<TransactionContext>;

    fn stub() -> Arc<dyn ChaincodeStub> {
        Arc::new(MockStub::new("", vec![]))
    }

    #[test]
    fn test_builder_reports_first_error() {
        let err = TestContract::builder("c")
            .function("Big", |_: i128| {})
            .function("", || {})
            .build()
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidParameter { .. }));
    }

    #[test]
    fn test_duplicate_registrations() {
        let err = TestContract::builder("c")
            .function("F", || {})
            .function("F", || 1_i32)
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Function F already registered in contract c");

        let err = TestContract::builder("c")
            .before(|| {})
            .before(|| {})
            .build()
            .unwrap_err();
        assert_eq!(err.to_string(), "Before transaction already registered in contract c");
    }

    #[test]
    fn test_blank_names() {
        assert_eq!(
            TestContract::builder(" ").build().unwrap_err(),
            RegistrationError::BlankContractName
        );
        assert_eq!(
            TestContract::builder("c").function("", || {}).build().unwrap_err(),
            RegistrationError::BlankFunctionName("c".into())
        );
    }

    #[test]
    fn test_lifecycle_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (b, n, a) = (log.clone(), log.clone(), log.clone());
        let contract = TestContract::builder("c")
            .before(move || b.lock().unwrap().push("B"))
            .function("N", move || n.lock().unwrap().push("N"))
            .after(move || a.lock().unwrap().push("A"))
            .build()
            .unwrap();

        contract.invoke(stub(), "N", &[], None).unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["B", "N", "A"]);
    }

    #[test]
    fn test_function_not_found() {
        let contract = TestContract::builder("c").function("N", || {}).build().unwrap();
        let err = contract.invoke(stub(), "Missing", &[], None).unwrap_err();
        assert_eq!(err.to_string(), "Function Missing not found in contract c");
    }

    #[test]
    fn test_context_shared_across_phases() {
        #[derive(Default)]
        struct Counting {
            stub: Option<Arc<dyn ChaincodeStub>>,
            seen: u32,
        }
        impl ContextInterface for Counting {
            fn set_stub(&mut self, stub: Arc<dyn ChaincodeStub>) {
                self.stub = Some(stub);
            }
            fn stub(&self) -> Option<&Arc<dyn ChaincodeStub>> {
                self.stub.as_ref()
            }
        }

        let contract = Contract::<Counting>::builder("c")
            .before(|ctx: &mut Counting| ctx.seen += 1)
            .function("N", |ctx: &mut Counting| -> u32 {
                ctx.seen += 1;
                ctx.seen
            })
            .build()
            .unwrap();
        assert_eq!(contract.invoke(stub(), "N", &[], None).unwrap(), "2");
    }

    #[test]
    fn test_metadata() {
        let contract = TestContract::builder("assets")
            .function("Create", |_: &mut TransactionContext, _: String, _: u64| {})
            .function("Count", || 0_u32)
            .build()
            .unwrap();
        let mut components = ComponentMetadata::default();
        let meta = contract.metadata(&mut components);

        let names: Vec<_> = meta.transactions.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["Count", "Create"]);
        assert_eq!(meta.transactions[1].parameters.len(), 2);
        assert!(meta.transactions[0].returns.is_some());
        assert!(meta.transactions[1].returns.is_none());
    }
}
