//! Encryption of individual string values.
//!
//! An encrypted value is a self-describing token:
//!
//! ```text
//! ENC[AES256_GCM,data:<base64>,iv:<base64>,tag:<base64>,type:str]
//! ```
//!
//! Every value gets a fresh random nonce. The additional authenticated data
//! passed by the caller binds the ciphertext to its position in the document
//! (the key name for values, the timestamp for the MAC), so a token moved to
//! another key will not decrypt.
//!
//! The empty string is left as-is in both directions.

use crate::{
    ciphers::{AuthTag, CipherKind},
    error::{Error, Result},
    keys::DataKey,
    rand,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::{fmt, str::FromStr};

const TOKEN_PREFIX: &str = "ENC[";
const TOKEN_SUFFIX: &str = "]";
/// the only value type an envelope holds
const VALUE_TYPE: &str = "str";

/// Encrypt `plaintext` under the data key, binding it to `aad`.
pub fn encrypt(
    kind: CipherKind,
    plaintext: &str,
    key: &DataKey,
    aad: &str,
) -> Result<String, Error> {
    if plaintext.is_empty() {
        return Ok(String::new());
    }
    let iv = rand::random_vec(kind.nonce_len())?;
    let cipher = kind.init_from(key.as_bytes(), &iv)?;
    let mut data = plaintext.as_bytes().to_vec();
    let tag = cipher.seal_detached(&mut data, Some(aad.as_bytes()))?;
    Ok(EncryptedValue { kind, data, iv, tag }.to_string())
}

/// Decrypt a token produced by `encrypt`. The cipher is taken from the token.
/// Fails if the token is malformed, or if data, iv, tag, or aad do not authenticate.
pub fn decrypt(token: &str, key: &DataKey, aad: &str) -> Result<String, Error> {
    if token.is_empty() {
        return Ok(String::new());
    }
    let EncryptedValue {
        kind,
        mut data,
        iv,
        tag,
    } = token.parse()?;
    if iv.len() != kind.nonce_len() {
        return Err(Error::DecryptionError(format!(
            "iv length {} does not match cipher {}",
            iv.len(),
            kind
        )));
    }
    let cipher = kind.init_from(key.as_bytes(), &iv)?;
    cipher.open_detached(&mut data, tag.get_slice(), Some(aad.as_bytes()))?;
    Ok(String::from_utf8(data)?)
}

/// Parsed form of an encrypted value token
#[derive(Clone, Debug, PartialEq)]
pub struct EncryptedValue {
    pub kind: CipherKind,
    pub data: Vec<u8>,
    pub iv: Vec<u8>,
    pub tag: AuthTag,
}

impl fmt::Display for EncryptedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{},data:{},iv:{},tag:{},type:{}{}",
            TOKEN_PREFIX,
            self.kind,
            STANDARD.encode(&self.data),
            STANDARD.encode(&self.iv),
            STANDARD.encode(self.tag.get_slice()),
            VALUE_TYPE,
            TOKEN_SUFFIX,
        )
    }
}

/// extract base64 field `name:...` and decode it
fn field(part: Option<&str>, name: &str) -> Result<Vec<u8>, Error> {
    let text = part
        .and_then(|p| p.strip_prefix(name))
        .and_then(|p| p.strip_prefix(':'))
        .ok_or_else(|| Error::DecryptionError(format!("missing '{}' in encrypted value", name)))?;
    STANDARD
        .decode(text)
        .map_err(|e| Error::DecryptionError(format!("invalid base64 in '{}': {}", name, e)))
}

impl FromStr for EncryptedValue {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix(TOKEN_PREFIX)
            .and_then(|b| b.strip_suffix(TOKEN_SUFFIX))
            .ok_or_else(|| {
                Error::DecryptionError("value does not match the encrypted data format".to_string())
            })?;
        let mut parts = body.split(',');
        let kind = CipherKind::from_str(parts.next().unwrap_or_default())?;
        let data = field(parts.next(), "data")?;
        let iv = field(parts.next(), "iv")?;
        let tag = AuthTag::from_slice(&field(parts.next(), "tag")?)?;
        match parts.next() {
            Some(t) if t.strip_prefix("type:") == Some(VALUE_TYPE) => {}
            _ => {
                return Err(Error::DecryptionError(format!(
                    "encrypted value must have type:{}",
                    VALUE_TYPE
                )))
            }
        }
        if parts.next().is_some() {
            return Err(Error::DecryptionError(
                "unexpected trailing fields in encrypted value".to_string(),
            ));
        }
        Ok(EncryptedValue { kind, data, iv, tag })
    }
}
