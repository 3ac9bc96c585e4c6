use crate::error::{Error, Result};
use bech32::{self, FromBase32, ToBase32, Variant};

/// All wrapped data keys begin with this prefix
const KEY_PREFIX: &str = "sk";

/// Types convertible to bech32-encoded string
pub trait ToBech32 {
    fn to_bech32(&self) -> Result<String, Error>;
}

/// Bech32-encoded String that can be decoded into Vector
pub trait FromBech32 {
    fn from_bech32(&self) -> Result<Vec<u8>, Error>;
}

impl<T: AsRef<[u8]> + ?Sized> ToBech32 for T {
    fn to_bech32(&self) -> Result<String, Error> {
        Ok(bech32::encode(
            KEY_PREFIX,
            self.as_ref().to_base32(),
            Variant::Bech32,
        )?)
    }
}

impl FromBech32 for str {
    fn from_bech32(&self) -> Result<Vec<u8>, Error> {
        let (hrp, data, _variant) = bech32::decode(self)?;
        if hrp != KEY_PREFIX {
            return Err(Error::InvalidParameter(format!(
                "wrapped key has prefix '{}', expected '{}'",
                hrp, KEY_PREFIX
            )));
        }
        Ok(Vec::<u8>::from_base32(&data)?)
    }
}
