//! # xchacha20 cipher
//!
//! XChaCha20-Poly1305 encryption cipher
//!

use crate::{
    ciphers::{AuthTag, Cipher},
    error::{Error, Result},
};
use bytes::Bytes;
use chacha20poly1305::aead::{generic_array::GenericArray, Aead, AeadInPlace, KeyInit, Payload};
use chacha20poly1305::XChaCha20Poly1305 as pxchacha;
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of bytes in key
pub const KEYBYTES: usize = 32;
/// Number of bytes in nonce
pub const NONCEBYTES: usize = 24;
/// Number of bytes in auth integrity tag
pub const TAGBYTES: usize = 16;

cipher_keybox!(KEYBYTES, NONCEBYTES, TAGBYTES);

/// XChaCha20-Poly1305 encryption cipher
/// Encryption algorithm is a pure rust implementation by
/// [RustCrypto AEAD](https://github.com/RustCrypto/AEADs/tree/master/chacha20poly1305)
pub struct XChaCha20 {
    kbox: KeyBox,
    aead: pxchacha,
}

/// Implementation of Debug that doesn't print key to prevent accidental leaks via logging
impl fmt::Debug for XChaCha20 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XChaCha20")
            .field("kbox", &self.kbox)
            .finish()
    }
}

impl XChaCha20 {
    /// Initialize cipher with provided key and nonce
    /// key length must be exactly KEYBYTES. nonce length must be >= NONCEBYTES
    pub fn init_from(key: &[u8], nonce: &[u8]) -> Result<Self, Error> {
        let kbox = KeyBox::init(key, nonce)?;
        let aead = pxchacha::new(GenericArray::from_slice(kbox.key_slice()));
        Ok(Self { kbox, aead })
    }
}

impl Cipher for XChaCha20 {
    // implementation of functions: nonce_len, key_len, tag_len, get_nonce
    cipher_impl!();

    /// Encrypts the slice, with optional authenticated data
    /// Return value is a simple vector that contains the ciphertext
    /// plus a MAC-based authentication tag.
    fn seal(&self, plaintext: &[u8], aad: Option<&[u8]>) -> Result<Bytes, Error> {
        let payload = Payload {
            msg: plaintext,
            aad: aad.unwrap_or(&[]),
        };
        Ok(Bytes::from(self.aead.encrypt(
            GenericArray::from_slice(self.kbox.nonce_slice()),
            payload,
        )?))
    }

    /// Decrypts the in-memory block, with optional authenticated data
    fn open(&self, ciphertext: &[u8], aad: Option<&[u8]>) -> Result<Bytes, Error> {
        let payload = Payload {
            msg: ciphertext,
            aad: aad.unwrap_or(&[]),
        };
        Ok(Bytes::from(self.aead.decrypt(
            GenericArray::from_slice(self.kbox.nonce_slice()),
            payload,
        )?))
    }

    fn seal_detached(&self, buf: &mut [u8], aad: Option<&[u8]>) -> Result<AuthTag, Error> {
        let tag = self.aead.encrypt_in_place_detached(
            GenericArray::from_slice(self.kbox.nonce_slice()),
            aad.unwrap_or(&[]),
            buf,
        )?;
        AuthTag::from_slice(tag.as_slice())
    }

    fn open_detached(&self, buf: &mut [u8], tag: &[u8], aad: Option<&[u8]>) -> Result<(), Error> {
        let tag = AuthTag::from_slice(tag)?;
        self.aead.decrypt_in_place_detached(
            GenericArray::from_slice(self.kbox.nonce_slice()),
            aad.unwrap_or(&[]),
            buf,
            GenericArray::from_slice(tag.get_slice()),
        )?;
        Ok(())
    }
}
