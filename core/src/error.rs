//! Crate error handling

use std::fmt;

pub use std::result::Result;
use thiserror::Error as ThisError;

/// Error enum that rolls-up all error messages in this crate
#[derive(Debug, ThisError)]
pub enum Error {
    /// Input could not be decoded: a data value that is not a string,
    /// or a document that does not parse.
    #[error("Malformed input: {0}")]
    Malformed(String),

    /// No master key was provided, or none of the configured master keys
    /// could recover the data key.
    #[error("Key unavailable: {0}")]
    KeyUnavailable(String),

    /// The data key could not be stored under the configured master keys.
    #[error("Failed to store data key: {0}")]
    KeyStorage(KeyStorageReport),

    /// The MAC recomputed from decrypted values differs from the stored MAC.
    #[error("failed to verify data integrity. expected mac {expected:?}, got {actual:?}")]
    MacMismatch { expected: String, actual: String },

    /// An encrypted value, or the stored MAC, failed authentication.
    #[error("failed to verify data integrity of {0}")]
    Tampered(String),

    #[error("data is already encrypted")]
    AlreadyEncrypted,

    #[error("data is not encrypted")]
    NotEncrypted,

    #[error("Encryption error: {0}")]
    EncryptionError(String),

    #[error("Decryption error: {0}")]
    DecryptionError(String),

    #[error("AEAD crypto error {0}")]
    AeadError(aead::Error),

    #[error("Invalid key string: {0}")]
    KeyEncodingError(#[from] bech32::Error),

    #[error("Invalid enum value {0}")]
    ParseError(#[from] strum::ParseError),

    #[error("Missing environment setting: {0}")]
    MissingEnv(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Keeper not found: {0}")]
    KeeperNotFound(String),

    #[error("IO error: {0}")]
    IOError(std::io::Error),

    #[error("Random generation error: {0}")]
    Random(String),

    #[error("encoding error {0}")]
    UTF8EncodingError(String),

    #[error("Error: {0}")]
    OtherError(String),
}

impl Error {
    /// True if the error means the document failed authentication:
    /// either a value (or the stored MAC) was altered, or the recomputed MAC differs.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Error::MacMismatch { .. } | Error::Tampered(_))
    }

    /// True if the caller should supply (or gain access to) a different master key
    pub fn is_key_unavailable(&self) -> bool {
        matches!(self, Error::KeyUnavailable(_))
    }
}

/// A master key that failed to encrypt the data key
#[derive(Debug)]
pub struct KeyFailure {
    /// uri of the master key
    pub key_uri: String,
    /// why the keeper failed
    pub error: Error,
}

/// Per-key failures collected while storing a new data key under every master key.
/// Collection does not stop at the first failure, so callers can judge
/// whether enough master keys remain.
#[derive(Debug, Default)]
pub struct KeyStorageReport {
    pub failures: Vec<KeyFailure>,
}

impl KeyStorageReport {
    /// true if every master key stored the data key
    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// uris of master keys that failed
    pub fn failed_uris(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.key_uri.as_str()).collect()
    }
}

impl fmt::Display for KeyStorageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failures.is_empty() {
            return write!(f, "no master keys");
        }
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", failure.key_uri, failure.error)?;
        }
        Ok(())
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(e: std::string::FromUtf8Error) -> Error {
        Error::UTF8EncodingError(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Error {
        Error::IOError(e)
    }
}

impl From<aead::Error> for Error {
    fn from(e: aead::Error) -> Error {
        Error::AeadError(e)
    }
}

impl From<getrandom::Error> for Error {
    fn from(_: getrandom::Error) -> Error {
        Error::Random(String::from("out of entropy"))
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Error {
        Error::Malformed(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Error {
        Error::Malformed(e.to_string())
    }
}
