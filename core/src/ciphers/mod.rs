//! Encryption ciphers
//!
//! Two AEAD ciphers are available for value encryption. Both take a 256-bit key and
//! produce a detached 16-byte authentication tag:
//! - AES-GCM (256-bit), the default
//! - XChaCha20-Poly1305, which is also used by the passphrase keepers to wrap data keys

#[macro_use]
mod macros;

mod aesgcm;
pub use aesgcm::aesgcm256;

pub mod value;
pub mod xchacha20;

use crate::error::{Error, Result};
use bytes::Bytes;
use std::fmt;
use strum_macros::{Display, EnumString};

/// Number of bytes in the auth integrity tag of every supported cipher
pub const TAGBYTES: usize = 16;

/// Supported symmetric ciphers.
/// The string form is the cipher tag written into encrypted values;
/// parsing also accepts a few shorter aliases.
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq)]
pub enum CipherKind {
    #[strum(
        to_string = "AES256_GCM",
        serialize = "AesGcm256",
        serialize = "aes",
        serialize = "aesgcm256",
        serialize = "aesgcm"
    )]
    AesGcm256,

    #[strum(
        to_string = "XCHACHA20_POLY1305",
        serialize = "XChaCha20Poly1305",
        serialize = "xchacha20poly1305",
        serialize = "xchacha20"
    )]
    XChaCha20Poly1305,
}

impl Default for CipherKind {
    fn default() -> Self {
        CipherKind::AesGcm256
    }
}

impl CipherKind {
    /// Initialize a cipher of this kind with the key and nonce.
    /// Key length must be exactly 32 bytes; nonce must be at least `nonce_len()` bytes.
    pub fn init_from(&self, key: &[u8], nonce: &[u8]) -> Result<Box<dyn Cipher>, Error> {
        let cipher: Box<dyn Cipher> = match self {
            CipherKind::AesGcm256 => Box::new(aesgcm256::AesGcm256::init_from(key, nonce)?),
            CipherKind::XChaCha20Poly1305 => Box::new(xchacha20::XChaCha20::init_from(key, nonce)?),
        };
        Ok(cipher)
    }

    /// number of nonce bytes required by this kind
    pub fn nonce_len(&self) -> usize {
        match self {
            CipherKind::AesGcm256 => aesgcm256::NONCEBYTES,
            CipherKind::XChaCha20Poly1305 => xchacha20::NONCEBYTES,
        }
    }
}

/// mac integrity tag generated during encryption, verified during decryption
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthTag(pub [u8; TAGBYTES]);

impl AuthTag {
    pub fn from_slice(t: &[u8]) -> Result<Self, Error> {
        if t.len() != TAGBYTES {
            return Err(Error::InvalidParameter(format!(
                "Invalid tag length {} expected {}",
                t.len(),
                TAGBYTES
            )));
        }
        let mut tag = [0u8; TAGBYTES];
        tag.copy_from_slice(t);
        Ok(AuthTag(tag))
    }

    pub fn get_slice(&self) -> &[u8] {
        &self.0
    }
}

/// Symmetric AEAD cipher with key and nonce fixed at initialization.
/// Implementations must not expose the key through Debug or Display.
pub trait Cipher: Send + Sync + fmt::Debug {
    /// number of bytes in nonce for this cipher
    fn nonce_len(&self) -> usize;

    /// number of bytes in key for this cipher
    fn key_len(&self) -> usize;

    /// number of bytes in auth tag
    fn tag_len(&self) -> usize;

    /// nonce this cipher was initialized with
    fn get_nonce(&self) -> &[u8];

    /// Encrypts the slice, with optional authenticated data.
    /// Returns ciphertext with the authentication tag appended.
    fn seal(&self, plaintext: &[u8], aad: Option<&[u8]>) -> Result<Bytes, Error>;

    /// Decrypts output of `seal`. Fails if ciphertext, tag or aad were altered.
    fn open(&self, ciphertext: &[u8], aad: Option<&[u8]>) -> Result<Bytes, Error>;

    /// Encrypts the buffer in place, returning the detached tag
    fn seal_detached(&self, buf: &mut [u8], aad: Option<&[u8]>) -> Result<AuthTag, Error>;

    /// Decrypts the buffer in place
    /// buf: mutable buffer containing ciphertext (in), to be overwritten with plaintext
    /// tag: auth tag data
    /// aad: optional additional authenticated data
    fn open_detached(&self, buf: &mut [u8], tag: &[u8], aad: Option<&[u8]>) -> Result<(), Error>;
}
