//! Chaincode assembly and namespace routing.
//!
//! A [`ContractChaincode`] owns every registered contract plus the system
//! contract, resolves `namespace:function` names and turns each invocation
//! into a transport [`Response`].

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::ChaincodeConfig;
use crate::metadata::{ComponentMetadata, ContractChaincodeMetadata, TransactionMetadata};
use crate::shim::{ChaincodeStub, Response};
use crate::types::DataType;

use super::contract::{Contract, ContractInterface};
use super::{ContractError, RegistrationError, TransactionContext};

/// Namespace of the built-in system contract
pub const SYSTEM_CONTRACT_NAME: &str = "org.hyperledger.fabric";

/// Separates namespace from function in an invocation name
const NAMESPACE_SEPARATOR: char = ':';

/// Peer-facing chaincode entry points
pub trait Chaincode: Send + Sync {
    /// Instantiate or upgrade. A blank function name succeeds without
    /// running anything.
    fn init(&self, stub: Arc<dyn ChaincodeStub>) -> Response;

    /// Route one invocation
    fn invoke(&self, stub: Arc<dyn ChaincodeStub>) -> Response;
}

/// A set of contracts served as one chaincode
pub struct ContractChaincode {
    contracts: HashMap<String, Box<dyn ContractInterface>>,
    default_contract: String,
    metadata: ContractChaincodeMetadata,
    supplementary: Option<ContractChaincodeMetadata>,
}

impl ContractChaincode {
    /// Start assembling a chaincode
    #[must_use]
    pub fn builder() -> ChaincodeBuilder {
        ChaincodeBuilder::default()
    }

    /// Namespace used for unqualified function names
    #[must_use]
    pub fn default_contract(&self) -> &str {
        &self.default_contract
    }

    /// Served metadata document
    #[must_use]
    pub const fn metadata(&self) -> &ContractChaincodeMetadata {
        &self.metadata
    }

    /// Whether arguments and returns are validated against a metadata file
    #[must_use]
    pub const fn validates_schemas(&self) -> bool {
        self.supplementary.is_some()
    }

    /// Registered namespaces, sorted, the system contract included
    #[must_use]
    pub fn contract_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.contracts.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve `name` and run it, returning the success payload
    pub fn route(
        &self,
        stub: Arc<dyn ChaincodeStub>,
        name: &str,
        params: &[String],
    ) -> Result<String, ContractError> {
        let (namespace, function) = self.split_name(name);
        let contract = self
            .contracts
            .get(namespace)
            .ok_or_else(|| ContractError::ContractNotFound(namespace.to_string()))?;

        if function.is_empty() {
            return Err(ContractError::BlankFunctionName);
        }

        debug!(contract = %namespace, function = %function, args = params.len(), "Routing invocation");
        contract.invoke(stub, function, params, self.supplementary.as_ref())
    }

    fn split_name<'a>(&'a self, name: &'a str) -> (&'a str, &'a str) {
        name.split_once(NAMESPACE_SEPARATOR)
            .unwrap_or((self.default_contract.as_str(), name))
    }
}

impl Chaincode for ContractChaincode {
    fn init(&self, stub: Arc<dyn ChaincodeStub>) -> Response {
        let (name, _) = stub.function_and_parameters();
        if name.trim().is_empty() {
            return Response::success(Vec::new());
        }
        self.invoke(stub)
    }

    fn invoke(&self, stub: Arc<dyn ChaincodeStub>) -> Response {
        let (name, params) = stub.function_and_parameters();
        let tx_id = stub.tx_id();
        match self.route(stub, &name, &params) {
            Ok(payload) => {
                debug!(function = %name, tx_id = %tx_id, "Invocation succeeded");
                Response::success(payload.into_bytes())
            }
            Err(e) => {
                warn!(function = %name, tx_id = %tx_id, error = %e, "Invocation failed");
                Response::error(e.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ContractChaincode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractChaincode")
            .field("contracts", &self.contract_names())
            .field("default_contract", &self.default_contract)
            .field("validates_schemas", &self.validates_schemas())
            .finish_non_exhaustive()
    }
}

/// Builder for [`ContractChaincode`]
#[derive(Default)]
pub struct ChaincodeBuilder {
    contracts: Vec<Box<dyn ContractInterface>>,
    config: ChaincodeConfig,
    metadata: Option<ContractChaincodeMetadata>,
}

impl ChaincodeBuilder {
    /// Add a contract
    #[must_use]
    pub fn contract(mut self, contract: impl ContractInterface + 'static) -> Self {
        self.contracts.push(Box::new(contract));
        self
    }

    /// Use `config` for the default namespace, metadata file and info block
    #[must_use]
    pub fn config(mut self, config: ChaincodeConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate against `metadata` instead of loading it from the config
    #[must_use]
    pub fn metadata(mut self, metadata: ContractChaincodeMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Assemble the chaincode
    pub fn build(self) -> Result<ContractChaincode, RegistrationError> {
        let result = self.assemble();
        if let Err(e) = &result {
            error!(error = %e, "Chaincode assembly failed");
        }
        result
    }

    fn assemble(self) -> Result<ContractChaincode, RegistrationError> {
        if self.contracts.is_empty() {
            return Err(RegistrationError::NoContracts);
        }

        let default_contract = self
            .config
            .default_contract
            .clone()
            .or_else(|| {
                self.contracts
                    .iter()
                    .find(|c| c.is_default())
                    .map(|c| c.name().to_string())
            })
            .or_else(|| self.contracts.first().map(|c| c.name().to_string()))
            .ok_or(RegistrationError::NoContracts)?;

        let mut contracts: HashMap<String, Box<dyn ContractInterface>> = HashMap::new();
        let mut generated = ContractChaincodeMetadata {
            info: self.config.info.clone(),
            ..ContractChaincodeMetadata::default()
        };

        for contract in self.contracts {
            let name = contract.name().to_string();
            if name == SYSTEM_CONTRACT_NAME || contracts.contains_key(&name) {
                return Err(RegistrationError::DuplicateContract(name));
            }
            let mut described = contract.metadata(&mut generated.components);
            described.default = name == default_contract;
            generated.contracts.insert(name.clone(), described);
            contracts.insert(name, contract);
        }

        if !contracts.contains_key(&default_contract) {
            return Err(RegistrationError::UnknownDefault(default_contract));
        }

        describe_system_contract(&mut generated);

        let supplementary = match (self.metadata, &self.config.metadata_path) {
            (Some(metadata), _) => Some(metadata),
            (None, Some(path)) => Some(
                ContractChaincodeMetadata::load_from_file(path)
                    .map_err(|e| RegistrationError::Metadata(e.to_string()))?,
            ),
            (None, None) => None,
        };

        let metadata = supplementary.clone().unwrap_or(generated);
        let document = metadata
            .to_json_string()
            .map_err(|e| RegistrationError::Metadata(e.to_string()))?;
        let system = Contract::<TransactionContext>::builder(SYSTEM_CONTRACT_NAME)
            .function("GetMetadata", move || document.clone())
            .build()?;
        contracts.insert(SYSTEM_CONTRACT_NAME.to_string(), Box::new(system));

        info!(
            contracts = contracts.len(),
            default_contract = %default_contract,
            supplementary_metadata = supplementary.is_some(),
            "Chaincode assembled"
        );

        Ok(ContractChaincode {
            contracts,
            default_contract,
            metadata,
            supplementary,
        })
    }
}

fn describe_system_contract(metadata: &mut ContractChaincodeMetadata) {
    let get_metadata = TransactionMetadata::describe(
        "GetMetadata",
        &[],
        Some(&String::type_desc()),
        &mut ComponentMetadata::default(),
    );
    metadata.contracts.insert(
        SYSTEM_CONTRACT_NAME.to_string(),
        crate::metadata::ContractMetadata {
            info: None,
            name: SYSTEM_CONTRACT_NAME.to_string(),
            transactions: vec![get_metadata],
            default: false,
        },
    );
}
