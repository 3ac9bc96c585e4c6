//! # Secret-Envelope
//!
//! An encrypted key/value envelope that can be embedded in a larger JSON or YAML document.
//!
//! An [`Envelope`](envelope/struct.Envelope.html) holds string values. When encrypted, each
//! value is replaced by a token like `ENC[AES256_GCM,data:...,iv:...,tag:...,type:str]`
//! and a metadata block is added under the reserved `sops` key. The metadata lists the
//! master keys that protect the document's data key, the time of encryption, and an
//! encrypted MAC over all keys and plaintext values, so that decryption detects added,
//! altered, swapped, or removed values.
//!
//! Master keys are handled by SecretKeepers, looked up by the scheme of the key uri.
//! Two are built in:
//!
//! - __Env__ derives the key-encryption-key from a passphrase stored in an
//! environment variable, using PBKDF2+HMAC+SHA256.
//! [EnvKeeper](keepers/env/struct.EnvKeeper.html)
//!
//! - __File__ does the same with a passphrase read from a file.
//! [FileKeeper](keepers/file/struct.FileKeeper.html)
//!
//! Other back-ends implement [`SecretKeeper`](keepers/trait.SecretKeeper.html) and are
//! registered at startup.
//!
//! ```no_run
//! # async fn example() -> Result<(), secret_envelope::Error> {
//! use secret_envelope::{Envelope, MasterKey};
//!
//! let plain = Envelope::new([("db_password", "hunter2")])?;
//! let sealed = plain.encrypt(Some(MasterKey::new("env:APP_PASSPHRASE"))).await?;
//! let json = sealed.to_json()?;
//!
//! let opened = Envelope::from_json(&json)?.decrypt().await?;
//! assert_eq!(opened.data()["db_password"], "hunter2");
//! # Ok(())
//! # }
//! ```
//!
//! ## Implementation notes
//!
//! Crypto algorithms are implemented by [RustCrypto](https://github.com/rustcrypto/),
//! a pure-rust implementation. Values are encrypted with AES-GCM (256-bit) by default,
//! or XChaCha20-Poly1305.
//!
//! Envelopes are never modified in place. `encrypt` and `decrypt` return new envelopes,
//! so independent envelopes can be processed concurrently on any runtime thread.
//!

pub mod ciphers;
mod crypt;
pub mod envelope;
pub mod error;
pub mod keepers;
pub mod keys;
pub mod metadata;
pub mod options;
pub mod rand;
pub mod store;
pub mod tree;
pub mod util;

pub use ciphers::CipherKind;
pub use envelope::Envelope;
pub use error::{Error, KeyStorageReport};
pub use keepers::SecretKeeper;
pub use keys::{DataKey, KeyRecord, MasterKey};
pub use options::EncryptOptions;

use serde::{Deserialize, Serialize};

/// A WrappedKey provides a way to store and communicate encrypted-encryption keys.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct WrappedKey {
    /// `key_enc` holds a string representation of an encrypted key
    /// The specific format may vary depending on the SecretKeeper; the passphrase
    /// keepers use bech32 with an `sk` prefix.
    pub key_enc: String,
    /// `key_uri` is the identifier for the wrapping method and/or the key used. The scheme of the
    /// uri determines the keeper type. For example, `env:APP_PASSPHRASE` is a key derived from
    /// the passphrase in variable `APP_PASSPHRASE`.
    pub key_uri: String,
    /// `ident` is any optional identifier for the key. It might be a fingerprint, a uuid,
    /// or an email address of the owner of a public (asymmetric) key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ident: Option<String>,
}

#[cfg(test)]
mod test_envelope;
