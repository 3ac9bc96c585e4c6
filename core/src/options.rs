//! Options for encryption

use crate::{
    ciphers::CipherKind,
    error::{Error, Result},
    util::getenv_default,
};
use std::str::FromStr;

/// Environment variable selecting the value cipher, any `CipherKind` name
pub const ENV_CIPHER: &str = "ENVELOPE_CIPHER";
/// Environment variable setting `unencrypted_suffix`
pub const ENV_UNENCRYPTED_SUFFIX: &str = "ENVELOPE_UNENCRYPTED_SUFFIX";
/// Environment variable setting `require_all_keys` (`1`, `true`, or `yes`)
pub const ENV_REQUIRE_ALL_KEYS: &str = "ENVELOPE_REQUIRE_ALL_KEYS";

/// Options for `Envelope::encrypt_with`
#[derive(Clone, Debug, PartialEq)]
pub struct EncryptOptions {
    /// Cipher for values and the MAC
    pub cipher: CipherKind,

    /// Keys ending with this suffix are stored in plaintext. The values are still
    /// covered by the MAC. If None, an envelope that was decrypted keeps the suffix
    /// it was encrypted with.
    pub unencrypted_suffix: Option<String>,

    /// If true, encryption fails when any master key cannot store the data key.
    /// Otherwise failed keys are logged and dropped, and encryption fails only
    /// when no master key stored the data key.
    pub require_all_keys: bool,
}

impl Default for EncryptOptions {
    fn default() -> Self {
        Self::defaults()
    }
}

impl EncryptOptions {
    pub fn defaults() -> Self {
        EncryptOptions {
            cipher: CipherKind::default(),
            unencrypted_suffix: None,
            require_all_keys: false,
        }
    }

    /// Defaults, overridden by any `ENVELOPE_*` environment variables that are set
    pub fn from_env() -> Result<Self, Error> {
        let mut opt = Self::defaults();
        let cipher = getenv_default(ENV_CIPHER, "");
        if !cipher.is_empty() {
            opt.cipher = CipherKind::from_str(&cipher).map_err(|_| {
                Error::InvalidParameter(format!("{}: unknown cipher '{}'", ENV_CIPHER, cipher))
            })?;
        }
        let suffix = getenv_default(ENV_UNENCRYPTED_SUFFIX, "");
        if !suffix.is_empty() {
            opt.unencrypted_suffix = Some(suffix);
        }
        let require = getenv_default(ENV_REQUIRE_ALL_KEYS, "");
        opt.require_all_keys = parse_flag(ENV_REQUIRE_ALL_KEYS, &require)?;
        Ok(opt)
    }

    pub fn with_cipher(mut self, cipher: CipherKind) -> Self {
        self.cipher = cipher;
        self
    }

    pub fn with_unencrypted_suffix(mut self, suffix: &str) -> Self {
        self.unencrypted_suffix = Some(suffix.to_string());
        self
    }

    pub fn with_require_all_keys(mut self, require: bool) -> Self {
        self.require_all_keys = require;
        self
    }
}

fn parse_flag(name: &str, val: &str) -> Result<bool, Error> {
    match val.to_ascii_lowercase().as_str() {
        "" | "0" | "false" | "no" => Ok(false),
        "1" | "true" | "yes" => Ok(true),
        _ => Err(Error::InvalidParameter(format!(
            "{}: expected true or false, got '{}'",
            name, val
        ))),
    }
}
