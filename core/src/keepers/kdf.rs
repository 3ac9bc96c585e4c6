//! Key derivation for the passphrase keepers (env and file)

use crate::{
    ciphers::{xchacha20::KEYBYTES, Cipher, CipherKind},
    error::{Error, Result},
};
use hmac::Hmac;
use sha2::Sha256;
use zeroize::Zeroizing;

/// Number of rounds for password generation.
/// More rounds takes longer for an attacker to brute-force guess any password.
/// ROUNDS may not change after deployment, or previously wrapped data keys
/// could not be unwrapped.
const ROUNDS: u32 = 20000;

/// Constant context prepended to every passphrase, so a derived key is specific
/// to this application even if the passphrase is reused elsewhere.
/// Must remain constant for the same reason as ROUNDS.
const CONTEXT: &str = "T8#vQ2%mw{Xc-secret-envelope-kek-^Lr5@Nz;P0u]hG7|dY3=";

/// Create a cipher from the kdf-derived key (aka, the key-encryption-key)
/// Uses PBKDF2+HMAC+SHA256 (from [RustCrypto](https://github.com/RustCrypto/password-hashes))
/// with the nonce as salt.
/// The nonce must be at least as long as required by the cipher algorithm.
/// (24 bytes for XChaCha20-Poly1305, 12 for AesGcm256)
pub fn key_cipher_from_pass(
    passphrase: &str,
    nonce: &[u8],
    alg: CipherKind,
) -> Result<Box<dyn Cipher>, Error> {
    if passphrase.is_empty() {
        return Err(Error::InvalidParameter("passphrase is empty".to_string()));
    }
    let derived = key_from_pass(passphrase, nonce)?;
    alg.init_from(derived.as_slice(), nonce)
        .map_err(|e| Error::OtherError(format!("bad nonce or derived key for keeper: {}", e)))
}

/// Generate key from passphrase.
/// This function is not public because keys should always be wrapped (encrypted)
/// to reduce risk of accidental logging or exposure.
/// For purposes of this function, nonce can be arbitrary length.
fn key_from_pass(passphrase: &str, nonce: &[u8]) -> Result<Zeroizing<Vec<u8>>, Error> {
    let mut derived = Zeroizing::new(vec![0u8; KEYBYTES]);
    let mut pass = Zeroizing::new(String::from(CONTEXT));
    pass.push_str(passphrase);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(pass.as_bytes(), nonce, ROUNDS, derived.as_mut_slice())
        .map_err(|e| Error::OtherError(format!("key derivation: {}", e)))?;
    Ok(derived)
}
