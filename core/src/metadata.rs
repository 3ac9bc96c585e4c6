//! Document metadata: key groups, MAC, and timestamp.
//!
//! [`Metadata`] is the working form used while encrypting and decrypting.
//! [`MetadataBlock`] is its persisted form, stored under the reserved `sops` key.

use crate::{
    error::{Error, KeyFailure, KeyStorageReport, Result},
    keys::{DataKey, KeyRecord, MasterKey},
    util::parse_rfc3339,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Format version written into new metadata blocks
pub const FORMAT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Master keys, any one of which can recover the data key
pub type KeyGroup = Vec<MasterKey>;

#[derive(Clone, Debug)]
pub struct Metadata {
    pub key_groups: Vec<KeyGroup>,
    /// RFC3339 time of the last encryption; empty until first encrypted
    pub last_modified: String,
    /// encrypted MAC token; empty while the document is plaintext
    pub mac: String,
    /// keys ending with this suffix are not encrypted
    pub unencrypted_suffix: Option<String>,
    pub version: String,
}

impl Metadata {
    /// Metadata for a new document, with one key group holding `key` if present
    pub fn new(key: Option<MasterKey>) -> Self {
        Metadata {
            key_groups: key.map(|k| vec![vec![k]]).unwrap_or_default(),
            last_modified: String::new(),
            mac: String::new(),
            unencrypted_suffix: None,
            version: FORMAT_VERSION.to_string(),
        }
    }

    /// true if any key group holds at least one master key
    pub fn has_key(&self) -> bool {
        self.key_groups.iter().any(|g| !g.is_empty())
    }

    pub(crate) fn key_count(&self) -> usize {
        self.key_groups.iter().map(|g| g.len()).sum()
    }

    /// true if the value stored under `key` is left in plaintext
    pub fn is_unencrypted_key(&self, key: &str) -> bool {
        match &self.unencrypted_suffix {
            Some(suffix) if !suffix.is_empty() => key.ends_with(suffix.as_str()),
            _ => false,
        }
    }

    /// Recover the data key with the first master key that can, trying groups in order
    pub async fn get_data_key(&self) -> Result<DataKey, Error> {
        let mut attempted = Vec::new();
        for key in self.key_groups.iter().flatten() {
            match key.decrypt().await {
                Ok(data_key) => return Ok(data_key),
                Err(e) => {
                    debug!(
                        key_uri = %key.uri(),
                        error = %e,
                        "master key could not recover data key"
                    );
                    attempted.push(format!("{}: {}", key.uri(), e));
                }
            }
        }
        if attempted.is_empty() {
            return Err(Error::KeyUnavailable(
                "document has no master keys".to_string(),
            ));
        }
        Err(Error::KeyUnavailable(format!(
            "no master key could recover the data key ({})",
            attempted.join("; ")
        )))
    }

    /// Generate a new data key and wrap it with every master key.
    ///
    /// Keys that fail to wrap are removed from the key groups, and groups left empty
    /// are dropped, so the metadata only lists keys that can recover the new data key.
    /// The failures are returned in the report. Fails with `KeyStorage` only if no
    /// master key stored the data key.
    pub async fn generate_data_key(&mut self) -> Result<(DataKey, KeyStorageReport), Error> {
        let data_key = DataKey::generate()?;
        let mut report = KeyStorageReport::default();
        let mut groups = Vec::with_capacity(self.key_groups.len());
        for group in self.key_groups.iter() {
            let mut kept = KeyGroup::with_capacity(group.len());
            for key in group.iter() {
                match key.encrypt(&data_key).await {
                    Ok(record) => {
                        let mut stored = key.clone();
                        stored.record = Some(record);
                        kept.push(stored);
                    }
                    Err(error) => {
                        warn!(key_uri = %key.uri(), %error, "failed to store data key");
                        report.failures.push(KeyFailure {
                            key_uri: key.uri().to_string(),
                            error,
                        });
                    }
                }
            }
            if !kept.is_empty() {
                groups.push(kept);
            }
        }
        if groups.is_empty() {
            return Err(Error::KeyStorage(report));
        }
        self.key_groups = groups;
        Ok((data_key, report))
    }

    /// Persisted form
    pub fn to_block(&self) -> MetadataBlock {
        MetadataBlock {
            key_groups: self
                .key_groups
                .iter()
                .map(|g| g.iter().filter_map(|k| k.record().cloned()).collect())
                .filter(|g: &Vec<KeyRecord>| !g.is_empty())
                .collect(),
            lastmodified: self.last_modified.clone(),
            mac: self.mac.clone(),
            unencrypted_suffix: self.unencrypted_suffix.clone(),
            version: self.version.clone(),
        }
    }

    /// Working form of a persisted block. The block is validated first.
    pub fn from_block(block: &MetadataBlock) -> Result<Self, Error> {
        block.validate()?;
        Ok(Metadata {
            key_groups: block
                .key_groups
                .iter()
                .map(|g| g.iter().cloned().map(MasterKey::from_record).collect())
                .collect(),
            last_modified: block.lastmodified.clone(),
            mac: block.mac.clone(),
            unencrypted_suffix: block.unencrypted_suffix.clone(),
            version: block.version.clone(),
        })
    }
}

/// Metadata as stored in the document
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct MetadataBlock {
    #[serde(default)]
    pub key_groups: Vec<Vec<KeyRecord>>,
    #[serde(default)]
    pub lastmodified: String,
    #[serde(default)]
    pub mac: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unencrypted_suffix: Option<String>,
    #[serde(default)]
    pub version: String,
}

impl MetadataBlock {
    /// true if the block carries a MAC, i.e. the document is encrypted
    pub fn has_mac(&self) -> bool {
        !self.mac.is_empty()
    }

    /// Check the fields the decoder cannot check by type alone
    pub fn validate(&self) -> Result<(), Error> {
        if !self.lastmodified.is_empty() {
            parse_rfc3339(&self.lastmodified)?;
        }
        if self.has_mac() && self.lastmodified.is_empty() {
            return Err(Error::Malformed(
                "metadata has a mac but no lastmodified time".to_string(),
            ));
        }
        for record in self.key_groups.iter().flatten() {
            if record.wrapped.key_uri.is_empty() {
                return Err(Error::Malformed(
                    "key record is missing key_uri".to_string(),
                ));
            }
        }
        Ok(())
    }
}
