//! Peer transport boundary.
//!
//! The router only sees the transport through [`ChaincodeStub`]: it reads the
//! invoked function and its arguments, hands the stub to the transaction
//! context, and answers with a [`Response`]. Framing, gRPC and ledger storage
//! live on the other side of this trait.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Successful response status
pub const OK: i32 = 200;

/// Failed response status
pub const ERROR: i32 = 500;

/// Errors raised by a stub's ledger operations
#[derive(Debug, thiserror::Error)]
pub enum StubError {
    /// Key is empty or otherwise unusable
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// The peer refused or failed the operation
    #[error("ledger operation failed: {0}")]
    Ledger(String),
}

/// Per-invocation view of the peer
pub trait ChaincodeStub: Send + Sync {
    /// Invoked function name and its ordered string arguments
    fn function_and_parameters(&self) -> (String, Vec<String>);

    /// Read a key from the world state
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StubError>;

    /// Write a key to the world state
    fn put_state(&self, key: &str, value: Vec<u8>) -> Result<(), StubError>;

    /// Delete a key from the world state
    fn del_state(&self, key: &str) -> Result<(), StubError>;

    /// Transaction ID
    fn tx_id(&self) -> String;

    /// Channel the transaction was submitted on
    fn channel_id(&self) -> String;

    /// Client-supplied transaction timestamp
    fn tx_timestamp(&self) -> DateTime<Utc>;

    /// Serialized identity of the submitter
    fn creator(&self) -> Vec<u8>;
}

/// Envelope returned to the peer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    /// [`OK`] or [`ERROR`]
    pub status: i32,
    /// Failure message, empty on success
    pub message: String,
    /// Success payload
    pub payload: Vec<u8>,
}

impl Response {
    /// Successful response carrying `payload`
    #[must_use]
    pub fn success(payload: Vec<u8>) -> Self {
        Self {
            status: OK,
            message: String::new(),
            payload,
        }
    }

    /// Failed response carrying `message`
    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ERROR,
            message: message.into(),
            payload: Vec::new(),
        }
    }

    /// Whether the status is [`OK`]
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == OK
    }

    /// Payload as UTF-8 text
    #[must_use]
    pub fn payload_str(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

static TX_COUNTER: AtomicU64 = AtomicU64::new(0);

/// In-memory stub for tests and local runs
#[derive(Debug)]
pub struct MockStub {
    channel_id: String,
    function: String,
    args: Vec<String>,
    tx_id: String,
    timestamp: DateTime<Utc>,
    creator: Vec<u8>,
    state: Mutex<HashMap<String, Vec<u8>>>,
}

impl MockStub {
    /// Stub for invoking `function` with `args` on an empty ledger
    #[must_use]
    pub fn new(function: impl Into<String>, args: Vec<String>) -> Self {
        Self::with_state(function, args, HashMap::new())
    }

    /// Stub preloaded with ledger `state`
    #[must_use]
    pub fn with_state(
        function: impl Into<String>,
        args: Vec<String>,
        state: HashMap<String, Vec<u8>>,
    ) -> Self {
        let function = function.into();
        let timestamp = Utc::now();
        let nonce = TX_COUNTER.fetch_add(1, Ordering::Relaxed);

        let mut hasher = Sha256::new();
        hasher.update(function.as_bytes());
        for arg in &args {
            hasher.update(arg.as_bytes());
        }
        hasher.update(nonce.to_le_bytes());
        hasher.update(timestamp.timestamp_nanos_opt().unwrap_or_default().to_le_bytes());
        let tx_id = hex::encode(hasher.finalize());

        Self {
            channel_id: "mockchannel".to_string(),
            function,
            args,
            tx_id,
            timestamp,
            creator: b"mock-creator".to_vec(),
            state: Mutex::new(state),
        }
    }

    /// Snapshot of the ledger
    #[must_use]
    pub fn state(&self) -> HashMap<String, Vec<u8>> {
        self.state
            .lock()
            .map(|state| state.clone())
            .unwrap_or_default()
    }

    fn with_ledger<R>(
        &self,
        op: impl FnOnce(&mut HashMap<String, Vec<u8>>) -> R,
    ) -> Result<R, StubError> {
        let mut state = self
            .state
            .lock()
            .map_err(|e| StubError::Ledger(format!("state lock poisoned: {e}")))?;
        Ok(op(&mut state))
    }
}

fn check_key(key: &str) -> Result<(), StubError> {
    if key.is_empty() {
        return Err(StubError::InvalidKey("key must not be empty".to_string()));
    }
    Ok(())
}

impl ChaincodeStub for MockStub {
    fn function_and_parameters(&self) -> (String, Vec<String>) {
        (self.function.clone(), self.args.clone())
    }

    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StubError> {
        check_key(key)?;
        self.with_ledger(|state| state.get(key).cloned())
    }

    fn put_state(&self, key: &str, value: Vec<u8>) -> Result<(), StubError> {
        check_key(key)?;
        self.with_ledger(|state| {
            state.insert(key.to_string(), value);
        })
    }

    fn del_state(&self, key: &str) -> Result<(), StubError> {
        check_key(key)?;
        self.with_ledger(|state| {
            state.remove(key);
        })
    }

    fn tx_id(&self) -> String {
        self.tx_id.clone()
    }

    fn channel_id(&self) -> String {
        self.channel_id.clone()
    }

    fn tx_timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn creator(&self) -> Vec<u8> {
        self.creator.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        let stub = MockStub::new("Put", vec![]);
        stub.put_state("k", b"v".to_vec()).unwrap();
        assert_eq!(stub.get_state("k").unwrap(), Some(b"v".to_vec()));

        stub.del_state("k").unwrap();
        assert_eq!(stub.get_state("k").unwrap(), None);
    }

    #[test]
    fn test_empty_key_rejected() {
        let stub = MockStub::new("Put", vec![]);
        assert!(matches!(stub.put_state("", vec![]), Err(StubError::InvalidKey(_))));
    }

    #[test]
    fn test_tx_ids_unique() {
        let a = MockStub::new("F", vec!["x".into()]);
        let b = MockStub::new("F", vec!["x".into()]);
        assert_ne!(a.tx_id(), b.tx_id());
        assert_eq!(a.tx_id().len(), 64);
    }

    #[test]
    fn test_response() {
        let ok = Response::success(b"done".to_vec());
        assert!(ok.is_ok());
        assert_eq!(ok.payload_str(), "done");

        let err = Response::error("boom");
        assert_eq!(err.status, ERROR);
        assert_eq!(err.message, "boom");
    }
}
