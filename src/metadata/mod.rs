//! Contract metadata documents.
//!
//! The metadata document describes every contract, its transactions and the
//! JSON schema of each parameter and return value. It is either generated
//! from the registered functions or read from a file named in the
//! configuration. Only a document read from a file is used to validate
//! arguments and return values; the generated one is served by the system
//! contract.

pub mod schema;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::types::TypeDesc;

pub use schema::{Schema, SchemaError, Violation};

/// Metadata I/O errors
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// File could not be read
    #[error("failed to read metadata file: {0}")]
    Io(#[from] std::io::Error),

    /// File is not a valid metadata document
    #[error("failed to parse metadata file: {0}")]
    Parse(String),
}

/// Top-level metadata for a chaincode
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractChaincodeMetadata {
    /// Chaincode-level information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<InfoMetadata>,
    /// Contracts by namespace
    #[serde(default)]
    pub contracts: BTreeMap<String, ContractMetadata>,
    /// Shared schemas
    #[serde(default)]
    pub components: ComponentMetadata,
}

/// Title and version of a chaincode or contract
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoMetadata {
    /// Display title
    #[serde(default)]
    pub title: String,
    /// Version string
    #[serde(default)]
    pub version: String,
    /// Free-form description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Metadata for one contract
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractMetadata {
    /// Contract information
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<InfoMetadata>,
    /// Namespace
    pub name: String,
    /// Transactions in registration order
    #[serde(default)]
    pub transactions: Vec<TransactionMetadata>,
    /// Whether this is the default contract
    #[serde(default)]
    pub default: bool,
}

/// Metadata for one transaction (contract function)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionMetadata {
    /// Parameters in declaration order
    #[serde(default)]
    pub parameters: Vec<ParameterMetadata>,
    /// Success value schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub returns: Option<ReturnMetadata>,
    /// Free-form tags
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<String>,
    /// Function name
    pub name: String,
}

/// Metadata for one parameter
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterMetadata {
    /// Name used in error messages
    pub name: String,
    /// Schema fragment
    pub schema: serde_json::Value,
}

/// Metadata for a success value
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnMetadata {
    /// Schema fragment
    pub schema: serde_json::Value,
}

/// Component schemas shared across transactions
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    /// Schemas by component name
    #[serde(default)]
    pub schemas: BTreeMap<String, serde_json::Value>,
}

impl ContractChaincodeMetadata {
    /// Load a metadata document from a JSON file
    pub fn load_from_file(path: &Path) -> Result<Self, MetadataError> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| MetadataError::Parse(e.to_string()))
    }

    /// Metadata for `function` in contract `contract`
    #[must_use]
    pub fn transaction(&self, contract: &str, function: &str) -> Option<&TransactionMetadata> {
        self.contracts
            .get(contract)?
            .transactions
            .iter()
            .find(|tx| tx.name == function)
    }

    /// Serialize the document
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl TransactionMetadata {
    /// Describe a function from its parameter and success types
    #[must_use]
    pub fn describe(
        name: &str,
        params: &[TypeDesc],
        success: Option<&TypeDesc>,
        components: &mut ComponentMetadata,
    ) -> Self {
        let parameters = params
            .iter()
            .enumerate()
            .map(|(i, desc)| ParameterMetadata {
                name: format!("param{i}"),
                schema: components.schema_for(desc),
            })
            .collect();

        Self {
            parameters,
            returns: success.map(|desc| ReturnMetadata {
                schema: components.schema_for(desc),
            }),
            tag: Vec::new(),
            name: name.to_string(),
        }
    }
}

impl ComponentMetadata {
    /// Schema for `desc`, registering struct components as they are met
    pub fn schema_for(&mut self, desc: &TypeDesc) -> serde_json::Value {
        match desc {
            TypeDesc::Basic(kind) => kind.schema(),
            TypeDesc::Array(elem, len) => json!({
                "type": "array",
                "items": self.schema_for(elem),
                "minItems": len,
                "maxItems": len,
            }),
            TypeDesc::Slice(elem) => json!({ "type": "array", "items": self.schema_for(elem) }),
            TypeDesc::Map { value, .. } => json!({
                "type": "object",
                "additionalProperties": self.schema_for(value),
            }),
            TypeDesc::Optional(inner) => json!({
                "anyOf": [self.schema_for(inner), { "type": "null" }],
            }),
            TypeDesc::Struct(s) => {
                if !self.schemas.contains_key(&s.name) {
                    let mut properties = serde_json::Map::new();
                    let mut required = Vec::new();
                    for (field, field_desc) in &s.fields {
                        properties.insert(field.clone(), self.schema_for(field_desc));
                        if !matches!(field_desc, TypeDesc::Optional(_)) {
                            required.push(field.clone());
                        }
                    }
                    self.schemas.insert(
                        s.name.clone(),
                        json!({
                            "$id": s.name,
                            "type": "object",
                            "properties": properties,
                            "required": required,
                            "additionalProperties": false,
                        }),
                    );
                }
                json!({ "$ref": format!("{}{}", schema::COMPONENT_REF_PREFIX, s.name) })
            }
            TypeDesc::Any | TypeDesc::Error | TypeDesc::Opaque(_) => json!({}),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DataType;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct Asset {
        id: String,
        owner: Option<Owner>,
    }
    crate::describe_struct!(Asset { id: String, owner: Option<Owner> });

    #[derive(Serialize, Deserialize)]
    struct Owner {
        name: String,
    }
    crate::describe_struct!(Owner { name: String });

    #[test]
    fn test_struct_components() {
        let mut components = ComponentMetadata::default();
        let schema = components.schema_for(&<Vec<Asset>>::type_desc());

        assert_eq!(
            schema,
            json!({ "type": "array", "items": { "$ref": "#/components/schemas/Asset" } })
        );
        assert_eq!(components.schemas["Asset"]["required"], json!(["id"]));
        assert!(components.schemas.contains_key("Owner"));
    }

    #[derive(Serialize, Deserialize)]
    struct Transfer {
        from: Owner,
        to: Owner,
    }
    crate::describe_struct!(Transfer { from: Owner, to: Owner });

    #[test]
    fn test_shared_struct_is_one_component() {
        let mut components = ComponentMetadata::default();
        components.schema_for(&Transfer::type_desc());

        let owner_ref = json!({ "$ref": "#/components/schemas/Owner" });
        assert_eq!(components.schemas["Transfer"]["properties"]["from"], owner_ref);
        assert_eq!(components.schemas["Transfer"]["properties"]["to"], owner_ref);
        assert_eq!(components.schemas.len(), 2);
        assert_eq!(components.schemas["Owner"]["required"], json!(["name"]));
    }

    #[test]
    fn test_generated_schema_accepts_serialized_value() {
        let mut components = ComponentMetadata::default();
        let schema_json = components.schema_for(&Asset::type_desc());
        let asset = Asset {
            id: "a1".into(),
            owner: None,
        };
        let instance = serde_json::to_value(&asset).unwrap();

        let schema = Schema::compile(&schema_json, Some(&components)).unwrap();
        assert!(schema.validate(&instance).is_empty());
    }

    #[test]
    fn test_transaction_lookup() {
        let mut components = ComponentMetadata::default();
        let tx = TransactionMetadata::describe(
            "Create",
            &[String::type_desc(), u64::type_desc()],
            None,
            &mut components,
        );
        assert_eq!(tx.parameters[1].name, "param1");

        let mut metadata = ContractChaincodeMetadata::default();
        metadata.contracts.insert(
            "assets".into(),
            ContractMetadata {
                name: "assets".into(),
                transactions: vec![tx],
                ..ContractMetadata::default()
            },
        );
        assert!(metadata.transaction("assets", "Create").is_some());
        assert!(metadata.transaction("assets", "Delete").is_none());
        assert!(metadata.transaction("other", "Create").is_none());
    }

    #[test]
    fn test_document_round_trip() {
        let doc = r#"{
            "contracts": {
                "assets": {
                    "name": "assets",
                    "transactions": [
                        { "name": "Create", "parameters": [{ "name": "id", "schema": { "type": "string" } }] }
                    ]
                }
            }
        }"#;
        let metadata: ContractChaincodeMetadata = serde_json::from_str(doc).unwrap();
        let tx = metadata.transaction("assets", "Create").unwrap();
        assert_eq!(tx.parameters[0].name, "id");
        assert!(tx.returns.is_none());
        assert!(metadata.components.schemas.is_empty());
    }
}
