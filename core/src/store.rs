//! Conversion between the serialized flat envelope and the document tree.
//!
//! The flat form is a JSON object of string values, plus the metadata block under
//! [`METADATA_KEY`] when encrypted. The tree form always has exactly one branch.

use crate::{
    error::{Error, Result},
    metadata::{Metadata, MetadataBlock},
    tree::{Tree, TreeBranch, TreeItem},
};
use serde_json::{Map, Value};

/// Reserved key holding the metadata block
pub const METADATA_KEY: &str = "sops";

/// Reads and writes flat envelopes as JSON
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonStore {}

/// parse a JSON object
fn parse_object(input: &[u8]) -> Result<Map<String, Value>, Error> {
    match serde_json::from_slice::<Value>(input)? {
        Value::Object(map) => Ok(map),
        other => Err(Error::Malformed(format!(
            "expected an object, found {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Error for a data value that is not a string
pub(crate) fn invalid_type(key: &str, value: &Value) -> Error {
    Error::Malformed(format!(
        "invalid type for data key {}: expected string, found {}",
        key,
        kind_of(value)
    ))
}

/// single branch from the data entries of an object; map iteration is in key order
fn branch_from(map: Map<String, Value>) -> Result<TreeBranch, Error> {
    map.into_iter()
        .map(|(key, value)| match value {
            Value::String(value) => Ok(TreeItem { key, value }),
            other => Err(invalid_type(&key, &other)),
        })
        .collect()
}

fn object_from(branch: &TreeBranch) -> Map<String, Value> {
    branch
        .iter()
        .map(|item| (item.key.clone(), Value::String(item.value.clone())))
        .collect()
}

impl JsonStore {
    pub fn new() -> Self {
        JsonStore {}
    }

    /// Branches of a plaintext envelope. The reserved metadata key is not allowed.
    pub fn load_plain_file(&self, input: &[u8]) -> Result<Vec<TreeBranch>, Error> {
        let map = parse_object(input)?;
        if map.contains_key(METADATA_KEY) {
            return Err(Error::Malformed(format!(
                "plaintext data may not contain the reserved key '{}'",
                METADATA_KEY
            )));
        }
        Ok(vec![branch_from(map)?])
    }

    /// Tree of an encrypted envelope. The metadata block is required.
    pub fn load_encrypted_file(&self, input: &[u8]) -> Result<Tree, Error> {
        let mut map = parse_object(input)?;
        let block = match map.remove(METADATA_KEY) {
            None | Some(Value::Null) => {
                return Err(Error::Malformed(format!(
                    "encrypted data is missing the '{}' metadata",
                    METADATA_KEY
                )))
            }
            Some(value) => serde_json::from_value::<MetadataBlock>(value)?,
        };
        Ok(Tree {
            metadata: Metadata::from_block(&block)?,
            branches: vec![branch_from(map)?],
        })
    }

    /// Plaintext envelope from the tree's branches
    pub fn emit_plain_file(&self, branches: &[TreeBranch]) -> Result<Vec<u8>, Error> {
        let branch = single_branch(branches)?;
        Ok(serde_json::to_vec(&Value::Object(object_from(branch)))?)
    }

    /// Encrypted envelope with the tree's metadata block
    pub fn emit_encrypted_file(&self, tree: &Tree) -> Result<Vec<u8>, Error> {
        let mut map = object_from(single_branch(&tree.branches)?);
        map.insert(
            METADATA_KEY.to_string(),
            serde_json::to_value(tree.metadata.to_block())?,
        );
        Ok(serde_json::to_vec(&Value::Object(map))?)
    }
}

fn single_branch(branches: &[TreeBranch]) -> Result<&TreeBranch, Error> {
    match branches {
        [branch] => Ok(branch),
        _ => Err(Error::InvalidParameter(format!(
            "envelope holds exactly one branch, tree has {}",
            branches.len()
        ))),
    }
}
