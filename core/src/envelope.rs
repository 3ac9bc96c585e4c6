//! The public key/value envelope.
//!
//! An `Envelope` serializes as a flat map of string values, plus the metadata block
//! under the reserved `sops` key once encrypted. It can be embedded as a field in any
//! serde-serializable struct, in JSON or YAML.
//!
//! Envelopes are immutable: [`encrypt`](Envelope::encrypt) and
//! [`decrypt`](Envelope::decrypt) return new envelopes and leave the source untouched.

use crate::{
    error::{Error, KeyStorageReport, Result},
    metadata::MetadataBlock,
    store::{invalid_type, METADATA_KEY},
    tree::Tree,
};
use serde::{
    de::{self, MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};
use std::{collections::BTreeMap, fmt, sync::Arc};

#[derive(Clone, Default)]
pub struct Envelope {
    pub(crate) data: BTreeMap<String, String>,
    pub(crate) sops: Option<MetadataBlock>,
    /// tree from the last encrypt or decrypt; never set by decoding
    pub(crate) tree: Option<Tree>,
    /// master keys that could not store the data key during the last encrypt
    pub(crate) key_storage: Option<Arc<KeyStorageReport>>,
}

impl Envelope {
    /// Plaintext envelope from key/value pairs.
    /// The reserved key `sops` may not be used.
    pub fn new<I, K, V>(pairs: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut data = BTreeMap::new();
        for (k, v) in pairs {
            let key = k.into();
            if key == METADATA_KEY {
                return Err(Error::InvalidParameter(format!(
                    "'{}' is reserved for envelope metadata",
                    METADATA_KEY
                )));
            }
            data.insert(key, v.into());
        }
        Ok(Envelope {
            data,
            sops: None,
            tree: None,
            key_storage: None,
        })
    }

    /// The stored values, encrypted or not. Check `is_encrypted` before using them as plaintext.
    pub fn data(&self) -> &BTreeMap<String, String> {
        &self.data
    }

    /// Persisted metadata, present once the envelope has been encrypted
    pub fn metadata(&self) -> Option<&MetadataBlock> {
        self.sops.as_ref()
    }

    /// Tree attached by the last encrypt or decrypt
    pub fn tree(&self) -> Option<&Tree> {
        self.tree.as_ref()
    }

    /// Master keys dropped by the last `encrypt` because they could not store the data key.
    /// None if every key succeeded, or the envelope did not come from `encrypt`.
    pub fn key_storage_report(&self) -> Option<&KeyStorageReport> {
        self.key_storage.as_deref()
    }

    /// true iff the metadata block is present with a non-empty MAC
    pub fn is_encrypted(&self) -> bool {
        self.sops.as_ref().map_or(false, |m| m.has_mac())
    }

    /// true if `encrypt` must be given a master key: the envelope has not been through
    /// encrypt or decrypt, or its tree has no master keys.
    pub fn needs_key(&self) -> bool {
        match &self.tree {
            None => true,
            Some(tree) => !tree.metadata.has_key(),
        }
    }

    pub fn from_json(input: &str) -> Result<Self, Error> {
        Ok(serde_json::from_str(input)?)
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_yaml(input: &str) -> Result<Self, Error> {
        Ok(serde_yaml::from_str(input)?)
    }

    pub fn to_yaml(&self) -> Result<String, Error> {
        Ok(serde_yaml::to_string(self)?)
    }
}

/// Lists keys and state, never values
impl fmt::Debug for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Envelope")
            .field("keys", &self.data.keys().collect::<Vec<_>>())
            .field("encrypted", &self.is_encrypted())
            .field("needs_key", &self.needs_key())
            .finish()
    }
}

impl Serialize for Envelope {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let len = self.data.len() + usize::from(self.sops.is_some());
        let mut map = serializer.serialize_map(Some(len))?;
        for (k, v) in self.data.iter() {
            map.serialize_entry(k, v)?;
        }
        if let Some(sops) = &self.sops {
            map.serialize_entry(METADATA_KEY, sops)?;
        }
        map.end()
    }
}

struct EnvelopeVisitor;

impl<'de> Visitor<'de> for EnvelopeVisitor {
    type Value = Envelope;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a map of string values")
    }

    fn visit_map<A>(self, mut access: A) -> std::result::Result<Envelope, A::Error>
    where
        A: MapAccess<'de>,
    {
        let mut envelope = Envelope::default();
        while let Some(key) = access.next_key::<String>()? {
            if key == METADATA_KEY {
                let block = access.next_value::<Option<MetadataBlock>>()?;
                if let Some(block) = &block {
                    block.validate().map_err(<A::Error as de::Error>::custom)?;
                }
                envelope.sops = block;
                continue;
            }
            match access.next_value::<serde_json::Value>()? {
                serde_json::Value::String(value) => {
                    envelope.data.insert(key, value);
                }
                other => return Err(de::Error::custom(invalid_type(&key, &other))),
            }
        }
        Ok(envelope)
    }
}

impl<'de> Deserialize<'de> for Envelope {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_map(EnvelopeVisitor)
    }
}
