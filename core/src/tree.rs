//! Document tree: metadata plus branches of key/value items.
//!
//! The tree is what gets encrypted and decrypted. Each pass over the branches also
//! computes the document MAC: an uppercase hex SHA-512 over the number of items, then
//! each item in branch order as length-prefixed key and plaintext value. Values left
//! unencrypted by the suffix rule are included.

use crate::{
    ciphers::{value, CipherKind},
    error::{Error, Result},
    keys::DataKey,
    metadata::Metadata,
};
use sha2::{Digest, Sha512};

#[derive(Clone, Debug, PartialEq)]
pub struct TreeItem {
    pub key: String,
    pub value: String,
}

pub type TreeBranch = Vec<TreeItem>;

#[derive(Clone, Debug)]
pub struct Tree {
    pub metadata: Metadata,
    pub branches: Vec<TreeBranch>,
}

/// additional data that binds a value to its key
fn value_aad(key: &str) -> String {
    format!("{}:", key)
}

/// SHA-512 over length-prefixed items, so keys and value boundaries are covered
struct MacHasher(Sha512);

impl MacHasher {
    fn new(items: usize) -> Self {
        let mut hasher = Sha512::new();
        hasher.update((items as u64).to_be_bytes());
        MacHasher(hasher)
    }

    fn field(&mut self, bytes: &[u8]) {
        self.0.update((bytes.len() as u64).to_be_bytes());
        self.0.update(bytes);
    }

    fn item(&mut self, key: &str, value: &str) {
        self.field(key.as_bytes());
        self.field(value.as_bytes());
    }

    fn finish(self) -> String {
        hex::encode_upper(self.0.finalize())
    }
}

impl Tree {
    /// Number of values across all branches
    pub fn value_count(&self) -> usize {
        self.branches.iter().map(|b| b.len()).sum()
    }

    /// Encrypt every value in place and return the MAC of the plaintext
    pub fn encrypt(&mut self, data_key: &DataKey, kind: CipherKind) -> Result<String, Error> {
        let mut hasher = MacHasher::new(self.value_count());
        for branch in self.branches.iter_mut() {
            for item in branch.iter_mut() {
                hasher.item(&item.key, &item.value);
                if self.metadata.is_unencrypted_key(&item.key) {
                    continue;
                }
                item.value = value::encrypt(kind, &item.value, data_key, &value_aad(&item.key))
                    .map_err(|e| {
                        Error::EncryptionError(format!("value '{}': {}", item.key, e))
                    })?;
            }
        }
        Ok(hasher.finish())
    }

    /// Decrypt every value in place and return the MAC of the recovered plaintext.
    /// A value that fails to parse or authenticate is an integrity failure.
    pub fn decrypt(&mut self, data_key: &DataKey) -> Result<String, Error> {
        let mut hasher = MacHasher::new(self.value_count());
        for branch in self.branches.iter_mut() {
            for item in branch.iter_mut() {
                if !self.metadata.is_unencrypted_key(&item.key) {
                    item.value = value::decrypt(&item.value, data_key, &value_aad(&item.key))
                        .map_err(|_| Error::Tampered(format!("value '{}'", item.key)))?;
                }
                hasher.item(&item.key, &item.value);
            }
        }
        Ok(hasher.finish())
    }
}
