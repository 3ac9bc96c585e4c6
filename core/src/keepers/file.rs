//! FileKeeper - derives key-encryption-key from a passphrase stored in a file

use crate::{
    ciphers::Cipher,
    error::{Error, Result},
    keepers::{env::PASSPHRASE_KEEPER_CIPHER, kdf::key_cipher_from_pass, SecretKeeper},
    util::{FromBech32, ToBech32},
    WrappedKey,
};

use async_trait::async_trait;
use bytes::Bytes;
use zeroize::Zeroizing;

const SCHEME: &str = "file";

/// FileKeeper reads a passphrase from a local file and derives the key-encryption-key
/// the same way as [EnvKeeper](../env/struct.EnvKeeper.html).
/// The passphrase is the file contents with one trailing newline (`\n` or `\r\n`) removed.
///
/// Uri formats:
/// - `file:PATH` - relative or absolute path
/// - `file:///abs/path` - url syntax
///
/// The file is read on every wrap and unwrap, so a rotated passphrase file takes effect
/// without restarting.
#[derive(Debug, Default)]
pub struct FileKeeper {}

impl FileKeeper {
    pub fn new() -> Self {
        FileKeeper {}
    }
}

#[async_trait]
impl SecretKeeper for FileKeeper {
    fn get_scheme(&self) -> &str {
        SCHEME
    }

    async fn wrap(&self, uri: &str, nonce: &[u8], key: &[u8]) -> Result<WrappedKey, Error> {
        let key_cipher = make_key_cipher(uri, nonce).await?;
        let encrypted = key_cipher.seal(key, None)?;
        Ok(WrappedKey {
            key_enc: encrypted.to_bech32()?,
            key_uri: String::from(uri),
            ident: None,
        })
    }

    async fn unwrap(&self, nonce: &[u8], wk: &WrappedKey) -> Result<Bytes, Error> {
        let key_cipher = make_key_cipher(&wk.key_uri, nonce).await?;
        let encrypted = wk.key_enc.from_bech32()?;
        key_cipher.open(&encrypted, None)
    }
}

/// file path from the uri
fn get_path(uri: &str) -> Result<&str, Error> {
    let path = uri
        .strip_prefix("file://")
        .or_else(|| uri.strip_prefix("file:"))
        .ok_or_else(|| {
            Error::InvalidParameter(
                "Invalid scheme for file keeper. Uri should begin with 'file:'".to_string(),
            )
        })?;
    if path.is_empty() {
        return Err(Error::InvalidParameter(
            "file keeper uri is missing a path".to_string(),
        ));
    }
    Ok(path)
}

async fn make_key_cipher(uri: &str, nonce: &[u8]) -> Result<Box<dyn Cipher>, Error> {
    let path = get_path(uri)?;
    let contents = Zeroizing::new(tokio::fs::read_to_string(path).await.map_err(|e| {
        Error::KeyUnavailable(format!("cannot read passphrase file {}: {}", path, e))
    })?);
    let passphrase = contents
        .strip_suffix('\n')
        .map(|p| p.strip_suffix('\r').unwrap_or(p))
        .unwrap_or(contents.as_str());
    key_cipher_from_pass(passphrase, nonce, PASSPHRASE_KEEPER_CIPHER)
}
