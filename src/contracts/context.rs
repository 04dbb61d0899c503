//! Per-invocation transaction context.
//!
//! A fresh context is created for every inbound call, handed the transport
//! stub once, and then shared by the before, named-or-unknown and after
//! phases of that call.

use std::fmt;
use std::sync::Arc;

use crate::shim::ChaincodeStub;
use crate::types::TypeDesc;

/// Context types a contract can bind
pub trait ContextInterface: Default + Send + 'static {
    /// Receive the transport stub, called once right after construction
    fn set_stub(&mut self, stub: Arc<dyn ChaincodeStub>);

    /// The stub, once set
    fn stub(&self) -> Option<&Arc<dyn ChaincodeStub>>;

    /// How the context type appears in function signatures
    fn type_desc() -> TypeDesc
    where
        Self: Sized,
    {
        TypeDesc::Opaque(short_type_name::<Self>())
    }
}

/// Type name without its module path or generic arguments
fn short_type_name<T: ?Sized>() -> String {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

/// Default context: carries only the stub
#[derive(Clone, Default)]
pub struct TransactionContext {
    stub: Option<Arc<dyn ChaincodeStub>>,
}

impl TransactionContext {
    /// The stub for this invocation.
    ///
    /// # Panics
    /// Panics if called outside an invocation, before the router set the stub
    #[must_use]
    pub fn get_stub(&self) -> &dyn ChaincodeStub {
        match &self.stub {
            Some(stub) => stub.as_ref(),
            None => super::invariant_violation("transaction context used before its stub was set"),
        }
    }
}

impl ContextInterface for TransactionContext {
    fn set_stub(&mut self, stub: Arc<dyn ChaincodeStub>) {
        self.stub = Some(stub);
    }

    fn stub(&self) -> Option<&Arc<dyn ChaincodeStub>> {
        self.stub.as_ref()
    }
}

impl fmt::Debug for TransactionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("tx_id", &self.stub.as_ref().map(|s| s.tx_id()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shim::MockStub;

    #[derive(Default)]
    struct Generic<T>(Option<T>);

    impl<T: Default + Send + 'static> ContextInterface for Generic<T> {
        fn set_stub(&mut self, _stub: Arc<dyn ChaincodeStub>) {}

        fn stub(&self) -> Option<&Arc<dyn ChaincodeStub>> {
            None
        }
    }

    #[test]
    fn test_type_desc() {
        assert_eq!(
            TransactionContext::type_desc(),
            TypeDesc::Opaque("TransactionContext".into())
        );
        assert_eq!(
            <Generic<String> as ContextInterface>::type_desc(),
            TypeDesc::Opaque("Generic".into())
        );
    }

    #[test]
    fn test_set_stub() {
        let mut ctx = TransactionContext::default();
        assert!(ctx.stub().is_none());

        let stub = Arc::new(MockStub::new("Fn", vec![]));
        let tx_id = stub.tx_id();
        ctx.set_stub(stub);
        assert_eq!(ctx.get_stub().tx_id(), tx_id);
    }
}
