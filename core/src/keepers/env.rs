//! EnvKeeper - derives key-encryption-key from a passphrase in an environment variable

use crate::{
    ciphers::{Cipher, CipherKind},
    error::{Error, Result},
    keepers::{kdf::key_cipher_from_pass, SecretKeeper},
    util::{getenv, FromBech32, ToBech32},
    WrappedKey,
};

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

/// Default variable name to be used if var not specified in the keeper uri
pub const ENV_VAR_NAME: &str = "ENVELOPE_PASSWORD";
/// EnvKeeper uri is "env:", or "env://VARNAME" to use a custom environment variable.
const SCHEME: &str = "env";

/// Cipher used to seal the data key with the derived key-encryption-key.
/// XChaCha20-Poly1305 is preferred for its longer nonce.
pub(crate) const PASSPHRASE_KEEPER_CIPHER: CipherKind = CipherKind::XChaCha20Poly1305;

/// EnvKeeper generates key-encryption-key from a passphrase in environment variable.
///
/// The passphrase from the environment is combined with the per-wrap nonce
/// through PBKDF2+HMAC+SHA256 to generate the key.
/// (Implementation by [RustCrypto](https://github.com/RustCrypto/password-hashes))
///
/// Uri formats:
/// - `env:` uses the default environment variable `ENVELOPE_PASSWORD`
/// - `env:VARNAME` - variable `VARNAME` contains the passphrase
/// - `env://VARNAME` - alternate syntax
///
#[derive(Debug, Default)]
pub struct EnvKeeper {}

impl EnvKeeper {
    pub fn new() -> Self {
        EnvKeeper {}
    }
}

#[async_trait]
impl SecretKeeper for EnvKeeper {
    /// returns the uri scheme
    fn get_scheme(&self) -> &str {
        SCHEME
    }

    /// Encrypts key with a passphrase-generated key
    /// Passphrase is retrieved from environment variable (default ENVELOPE_PASSWORD,
    /// or the name in the key uri "env:<VAR_NAME>").
    /// Returned encrypted key is stringified with bech32.
    async fn wrap(&self, uri: &str, nonce: &[u8], key: &[u8]) -> Result<WrappedKey, Error> {
        let key_cipher = make_key_cipher(uri, nonce)?;
        let encrypted = key_cipher.seal(key, None)?;
        Ok(WrappedKey {
            key_enc: encrypted.to_bech32()?,
            key_uri: String::from(uri),
            ident: None,
        })
    }

    /// Unwraps and decrypts key with a passphrase-generated key
    async fn unwrap(&self, nonce: &[u8], wk: &WrappedKey) -> Result<Bytes, Error> {
        let key_cipher = make_key_cipher(&wk.key_uri, nonce)?;
        let encrypted = wk.key_enc.from_bech32()?;
        key_cipher.open(&encrypted, None)
    }
}

/// lookup environment variable name from the uri
fn get_varname(uri: &str) -> Result<String, Error> {
    let url = Url::parse(uri).map_err(|e| {
        Error::InvalidParameter(format!(
            "Invalid uri. Should be 'env://VAR' or 'env:': {}",
            e
        ))
    })?;
    if url.scheme() != SCHEME {
        return Err(Error::InvalidParameter(
            "Invalid scheme for env keeper. Uri should begin with 'env:'".to_string(),
        ));
    }

    Ok(match url.host_str() {
        // "env://foo" -> (host:Some("foo"), path: "")
        // "env://foo/bar" -> (host:Some("foo"), path:"/bar")
        Some(host) => host,

        None => {
            if !url.path().is_empty() {
                // (alt syntax) "env:foo" -> (host:None, path:"foo")
                url.path()
            } else {
                ENV_VAR_NAME
            }
        }
    }
    .to_string())
}

/// derive the key from the passphrase named by the uri, and initialize Cipher with key
fn make_key_cipher(uri: &str, nonce: &[u8]) -> Result<Box<dyn Cipher>, Error> {
    let varname = get_varname(uri)?;
    let passphrase = getenv(&varname)?;
    key_cipher_from_pass(&passphrase, nonce, PASSPHRASE_KEEPER_CIPHER)
}
