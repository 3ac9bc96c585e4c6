//! CSRNG based on platform (OS) CSRNG.
//!
//! Used for data key generation, per-value nonces, and per-wrap key nonces.
//! Keepers backed by an external service generate their own key material.
//!
use crate::error::{Error, Result};

/// Fill the buffer with random bytes
/// Currently implemented using `getrandom` crate, which uses
/// native OS/platform implementations.
pub fn fill_buf(buf: &mut [u8]) -> Result<(), Error> {
    getrandom::getrandom(buf)?;
    Ok(())
}

/// Allocate a vector of `len` random bytes
pub fn random_vec(len: usize) -> Result<Vec<u8>, Error> {
    let mut v = vec![0u8; len];
    fill_buf(&mut v)?;
    Ok(v)
}
