//! Demo asset-transfer contract served by the binary.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use chaincode_router::metadata::InfoMetadata;
use chaincode_router::shim::StubError;
use chaincode_router::{describe_struct, Contract, RegistrationError, TransactionContext, Value};

/// Namespace of the demo contract
pub const CONTRACT_NAME: &str = "assets";

/// A tracked asset
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Ledger key
    pub id: String,
    /// Current owner
    pub owner: String,
    /// Appraised value
    pub value: u64,
}
describe_struct!(Asset { id: String, owner: String, value: u64 });

/// Asset contract failures
#[derive(Debug, thiserror::Error)]
pub enum AssetError {
    /// No asset under this key
    #[error("the asset {0} does not exist")]
    NotFound(String),

    /// Key already taken
    #[error("the asset {0} already exists")]
    AlreadyExists(String),

    /// Ledger access failed
    #[error(transparent)]
    Stub(#[from] StubError),

    /// Stored bytes are not an asset
    #[error("corrupt asset record: {0}")]
    Corrupt(#[from] serde_json::Error),
}

fn read(ctx: &TransactionContext, id: &str) -> Result<Asset, AssetError> {
    let bytes = ctx
        .get_stub()
        .get_state(id)?
        .ok_or_else(|| AssetError::NotFound(id.to_string()))?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn write(ctx: &TransactionContext, asset: &Asset) -> Result<(), AssetError> {
    let bytes = serde_json::to_vec(asset)?;
    ctx.get_stub().put_state(&asset.id, bytes)?;
    Ok(())
}

/// Build the demo contract
pub fn asset_contract() -> Result<Contract<TransactionContext>, RegistrationError> {
    Contract::builder(CONTRACT_NAME)
        .info(InfoMetadata {
            title: "Asset transfer".to_string(),
            version: chaincode_router::VERSION.to_string(),
            description: Some("Create, read, transfer and delete assets".to_string()),
        })
        .default_contract()
        .before(|ctx: &mut TransactionContext| {
            debug!(tx_id = %ctx.get_stub().tx_id(), "Asset transaction starting");
        })
        .after(|ctx: &mut TransactionContext, result: Value| {
            debug!(tx_id = %ctx.get_stub().tx_id(), result = ?result, "Asset transaction finished");
        })
        .unknown(|| -> Result<(), String> {
            Err("unknown asset transaction".to_string())
        })
        .function(
            "CreateAsset",
            |ctx: &mut TransactionContext,
             id: String,
             owner: String,
             value: u64|
             -> Result<(), AssetError> {
                if ctx.get_stub().get_state(&id)?.is_some() {
                    return Err(AssetError::AlreadyExists(id));
                }
                let asset = Asset { id, owner, value };
                write(ctx, &asset)?;
                info!(id = %asset.id, owner = %asset.owner, "Asset created");
                Ok(())
            },
        )
        .function(
            "ReadAsset",
            |ctx: &mut TransactionContext, id: String| -> Result<Asset, AssetError> {
                read(ctx, &id)
            },
        )
        .function(
            "AssetExists",
            |ctx: &mut TransactionContext, id: String| -> Result<bool, AssetError> {
                Ok(ctx.get_stub().get_state(&id)?.is_some())
            },
        )
        .function(
            "TransferAsset",
            |ctx: &mut TransactionContext, id: String, owner: String| -> Result<String, AssetError> {
                let mut asset = read(ctx, &id)?;
                let previous = std::mem::replace(&mut asset.owner, owner);
                write(ctx, &asset)?;
                Ok(previous)
            },
        )
        .function(
            "DeleteAsset",
            |ctx: &mut TransactionContext, id: String| -> Result<(), AssetError> {
                read(ctx, &id)?;
                ctx.get_stub().del_state(&id)?;
                Ok(())
            },
        )
        .build()
}

/// Ledger contents the demo starts from
pub fn seed_state() -> HashMap<String, Vec<u8>> {
    [
        Asset {
            id: "asset1".to_string(),
            owner: "Tomoko".to_string(),
            value: 300,
        },
        Asset {
            id: "asset2".to_string(),
            owner: "Brad".to_string(),
            value: 400,
        },
    ]
    .into_iter()
    .filter_map(|asset| {
        serde_json::to_vec(&asset)
            .ok()
            .map(|bytes| (asset.id, bytes))
    })
    .collect()
}
