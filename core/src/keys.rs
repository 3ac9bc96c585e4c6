//! Data keys and master keys.
//!
//! A [`DataKey`] encrypts the values of one document. It is never stored in the clear:
//! every [`MasterKey`] in the document's key groups keeps its own wrapped copy,
//! persisted as a [`KeyRecord`].

use crate::{
    ciphers::xchacha20::{KEYBYTES, NONCEBYTES},
    error::{Error, Result},
    keepers::SecretKeeper,
    rand,
    util::now_rfc3339,
    WrappedKey,
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of bytes in a data key
pub const DATA_KEY_BYTES: usize = KEYBYTES;

/// Symmetric key that encrypts document values. Zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DataKey([u8; DATA_KEY_BYTES]);

impl DataKey {
    /// New random key from the platform CSRNG
    pub fn generate() -> Result<Self, Error> {
        let mut key = [0u8; DATA_KEY_BYTES];
        rand::fill_buf(&mut key)?;
        Ok(DataKey(key))
    }

    /// Key from raw bytes, e.g. the output of `SecretKeeper::unwrap`
    pub fn from_slice(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() != DATA_KEY_BYTES {
            return Err(Error::InvalidParameter(format!(
                "data key must be {} bytes, got {}",
                DATA_KEY_BYTES,
                bytes.len()
            )));
        }
        let mut key = [0u8; DATA_KEY_BYTES];
        key.copy_from_slice(bytes);
        Ok(DataKey(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for DataKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DataKey({}B:SECRET)", DATA_KEY_BYTES)
    }
}

/// Persisted form of a data key wrapped by one master key.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct KeyRecord {
    #[serde(flatten)]
    pub wrapped: WrappedKey,
    /// hex-encoded nonce passed to the keeper for this wrap
    pub nonce: String,
    /// when the data key was wrapped (RFC3339)
    pub created_at: String,
}

/// Reference to a key-encryption-key managed by a [`SecretKeeper`].
///
/// The keeper is chosen by the scheme of `uri`. A master key loaded from a document
/// also carries the `KeyRecord` holding that document's wrapped data key.
#[derive(Clone)]
pub struct MasterKey {
    pub(crate) uri: String,
    pub(crate) keeper: Option<Arc<dyn SecretKeeper>>,
    pub(crate) record: Option<KeyRecord>,
}

impl MasterKey {
    /// Master key whose keeper is looked up in the registry when first used
    pub fn new(uri: &str) -> Self {
        MasterKey {
            uri: uri.to_string(),
            keeper: None,
            record: None,
        }
    }

    /// Master key bound to a specific keeper, bypassing the registry
    pub fn with_keeper(uri: &str, keeper: Arc<dyn SecretKeeper>) -> Self {
        MasterKey {
            uri: uri.to_string(),
            keeper: Some(keeper),
            record: None,
        }
    }

    /// Master key with its keeper resolved now, so an unknown scheme fails early
    pub async fn for_uri(uri: &str) -> Result<Self, Error> {
        let keeper = <dyn SecretKeeper>::for_uri(uri).await?;
        Ok(Self::with_keeper(uri, keeper))
    }

    /// Master key restored from a persisted record
    pub(crate) fn from_record(record: KeyRecord) -> Self {
        MasterKey {
            uri: record.wrapped.key_uri.clone(),
            keeper: None,
            record: Some(record),
        }
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// wrapped data key, if this master key has stored one
    pub fn record(&self) -> Option<&KeyRecord> {
        self.record.as_ref()
    }

    async fn keeper(&self) -> Result<Arc<dyn SecretKeeper>, Error> {
        match &self.keeper {
            Some(keeper) => Ok(keeper.clone()),
            None => <dyn SecretKeeper>::for_uri(&self.uri).await,
        }
    }

    /// Wrap the data key with this master key
    pub async fn encrypt(&self, data_key: &DataKey) -> Result<KeyRecord, Error> {
        let keeper = self.keeper().await?;
        let nonce = rand::random_vec(NONCEBYTES)?;
        let wrapped = keeper.wrap(&self.uri, &nonce, data_key.as_bytes()).await?;
        Ok(KeyRecord {
            wrapped,
            nonce: hex::encode(&nonce),
            created_at: now_rfc3339(),
        })
    }

    /// Recover the data key from this master key's record
    pub async fn decrypt(&self) -> Result<DataKey, Error> {
        let record = self.record.as_ref().ok_or_else(|| {
            Error::KeyUnavailable(format!("master key {} holds no data key", self.uri))
        })?;
        let nonce = hex::decode(&record.nonce)
            .map_err(|e| Error::Malformed(format!("key record nonce: {}", e)))?;
        let keeper = self.keeper().await?;
        let bytes = keeper.unwrap(&nonce, &record.wrapped).await?;
        DataKey::from_slice(&bytes)
    }
}

impl fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterKey")
            .field("uri", &self.uri)
            .field("bound_keeper", &self.keeper.is_some())
            .field("has_record", &self.record.is_some())
            .finish()
    }
}
