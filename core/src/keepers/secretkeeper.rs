use crate::{
    error::{Error, Result},
    keepers::{env::EnvKeeper, file::FileKeeper},
    WrappedKey,
};
use async_trait::async_trait;
use bytes::Bytes;
use lazy_static::lazy_static;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::RwLock;

lazy_static! {
    /// keepers by uri scheme
    static ref KEEPERS: RwLock<HashMap<String, Arc<dyn SecretKeeper>>> = {
        let mut map: HashMap<String, Arc<dyn SecretKeeper>> = HashMap::new();
        for keeper in [
            Arc::new(EnvKeeper::new()) as Arc<dyn SecretKeeper>,
            Arc::new(FileKeeper::new()) as Arc<dyn SecretKeeper>,
        ] {
            map.insert(keeper.get_scheme().to_string(), keeper);
        }
        RwLock::new(map)
    };
}

/// A SecretKeeper encrypts and decrypts data keys with a key-encryption-key it manages.
/// Implementations must be safe to call from any task; keepers backed by a network
/// service manage their own connections and rate limits.
#[async_trait]
pub trait SecretKeeper: Send + Sync + fmt::Debug {
    /// uri scheme handled by this keeper, e.g. "env"
    fn get_scheme(&self) -> &str;

    /// Encrypt `key` with the key-encryption-key identified by `uri`.
    /// `nonce` is fresh random data for this wrap and must be passed back to `unwrap`.
    async fn wrap(&self, uri: &str, nonce: &[u8], key: &[u8]) -> Result<WrappedKey, Error>;

    /// Decrypt a key produced by `wrap`. Fails if the caller lacks access
    /// to the key-encryption-key, or if the wrapped key was altered.
    async fn unwrap(&self, nonce: &[u8], wk: &WrappedKey) -> Result<Bytes, Error>;
}

impl dyn SecretKeeper {
    /// Add a keeper to the registry, replacing any keeper with the same scheme
    pub async fn register(keeper: Box<dyn SecretKeeper>) -> Result<(), Error> {
        let scheme = keeper.get_scheme().to_string();
        if scheme.is_empty() {
            return Err(Error::InvalidParameter(
                "keeper scheme may not be empty".to_string(),
            ));
        }
        tracing::debug!(%scheme, "registered keeper");
        KEEPERS.write().await.insert(scheme, Arc::from(keeper));
        Ok(())
    }

    /// Find the registered keeper for the uri's scheme
    pub async fn for_uri(uri: &str) -> Result<Arc<dyn SecretKeeper>, Error> {
        let scheme = scheme_of(uri)?;
        match KEEPERS.read().await.get(scheme) {
            Some(keeper) => Ok(keeper.clone()),
            None => Err(Error::KeeperNotFound(uri.to_string())),
        }
    }
}

/// Scheme part of a key uri: the text before the first ':'
pub fn scheme_of(uri: &str) -> Result<&str, Error> {
    match uri.split_once(':') {
        Some((scheme, _)) if !scheme.is_empty() => Ok(scheme),
        _ => Err(Error::InvalidParameter(format!(
            "key uri '{}' should begin with a scheme, e.g. 'env:'",
            uri
        ))),
    }
}
