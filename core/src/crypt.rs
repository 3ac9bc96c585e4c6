//! Encrypt and decrypt operations on envelopes.

use crate::{
    ciphers::value,
    envelope::Envelope,
    error::{Error, Result},
    keys::MasterKey,
    metadata::Metadata,
    options::EncryptOptions,
    store::JsonStore,
    tree::Tree,
    util::now_rfc3339,
};
use std::sync::Arc;
use tracing::{debug, warn};

impl Envelope {
    /// Encrypt with default options.
    ///
    /// If `key` is given, the result is protected by that key alone, replacing any keys
    /// from an earlier encryption. If `key` is None, the envelope must come from
    /// `decrypt` (so it still knows its master keys); check `needs_key` first.
    pub async fn encrypt(&self, key: Option<MasterKey>) -> Result<Envelope, Error> {
        self.encrypt_with(key, &EncryptOptions::defaults()).await
    }

    /// Encrypt with a fresh data key. `self` is not modified.
    ///
    /// Master keys that fail to store the data key are dropped from the result and listed
    /// in its `key_storage_report`, unless `require_all_keys` is set, which makes any
    /// failure an error.
    pub async fn encrypt_with(
        &self,
        key: Option<MasterKey>,
        opt: &EncryptOptions,
    ) -> Result<Envelope, Error> {
        if self.is_encrypted() {
            return Err(Error::AlreadyEncrypted);
        }
        let store = JsonStore::new();
        let mut tree = match &self.tree {
            Some(tree) => tree.clone(),
            None => Tree {
                metadata: Metadata::new(None),
                branches: store.load_plain_file(&serde_json::to_vec(&self.data)?)?,
            },
        };
        if let Some(key) = key {
            tree.metadata.key_groups = vec![vec![key]];
        }
        if opt.unencrypted_suffix.is_some() {
            tree.metadata.unencrypted_suffix = opt.unencrypted_suffix.clone();
        }
        if !tree.metadata.has_key() {
            return Err(Error::KeyUnavailable(
                "key is needed and one was not provided".to_string(),
            ));
        }

        let (data_key, report) = tree.metadata.generate_data_key().await?;
        if !report.is_empty() {
            if opt.require_all_keys {
                return Err(Error::KeyStorage(report));
            }
            warn!(
                failed = %report,
                remaining = tree.metadata.key_count(),
                "data key not stored under every master key"
            );
        }

        tree.metadata.last_modified = now_rfc3339();
        let mac = tree.encrypt(&data_key, opt.cipher)?;
        tree.metadata.mac =
            value::encrypt(opt.cipher, &mac, &data_key, &tree.metadata.last_modified)?;

        let encrypted = store.emit_encrypted_file(&tree)?;
        let mut out: Envelope = serde_json::from_slice(&encrypted)?;
        debug!(
            values = tree.value_count(),
            keys = tree.metadata.key_count(),
            cipher = %opt.cipher,
            "encrypted envelope"
        );
        out.tree = Some(tree);
        if !report.is_empty() {
            out.key_storage = Some(Arc::new(report));
        }
        Ok(out)
    }

    /// Decrypt and verify the MAC. `self` is not modified.
    ///
    /// Fails with `KeyUnavailable` if no master key can recover the data key, and with an
    /// integrity error (see `Error::is_integrity_failure`) if any value or the MAC was altered.
    pub async fn decrypt(&self) -> Result<Envelope, Error> {
        if !self.is_encrypted() {
            return Err(Error::NotEncrypted);
        }
        let store = JsonStore::new();
        let mut tree = match &self.tree {
            Some(tree) => tree.clone(),
            None => store.load_encrypted_file(&serde_json::to_vec(self)?)?,
        };

        let data_key = tree.metadata.get_data_key().await?;
        let mac = tree.decrypt(&data_key)?;
        let plain = store.emit_plain_file(&tree.branches)?;

        let stored_mac =
            value::decrypt(&tree.metadata.mac, &data_key, &tree.metadata.last_modified)
                .map_err(|_| Error::Tampered("message authentication code".to_string()))?;
        if stored_mac != mac {
            return Err(Error::MacMismatch {
                expected: stored_mac,
                actual: mac,
            });
        }

        let mut out: Envelope = serde_json::from_slice(&plain)?;
        debug!(values = tree.value_count(), "decrypted envelope");
        tree.metadata.mac.clear();
        out.tree = Some(tree);
        Ok(out)
    }
}
