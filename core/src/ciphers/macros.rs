//! Macros shared by Cipher implementations
//!

/// This macro, used by Cipher implementations,
/// provides a `struct KeyBox` containing sized key and nonce arrays.
/// Key and nonce are zeroized on drop.
/// The calling module must have `Error`, `Result`, `fmt`, `hex`,
/// `Zeroize` and `ZeroizeOnDrop` in scope.
macro_rules! cipher_keybox {
    ($keylen: expr, $noncelen: expr, $taglen: expr) => {
        #[derive(Zeroize, ZeroizeOnDrop)]
        struct KeyBox {
            key: [u8; $keylen],
            nonce: [u8; $noncelen],
        }

        #[allow(dead_code)]
        impl KeyBox {
            /// Build from slices. Key length must be exact;
            /// nonce must be at least as long as the cipher nonce, extra bytes are ignored.
            fn init(key: &[u8], nonce: &[u8]) -> Result<Self, Error> {
                if nonce.len() < $noncelen {
                    return Err(Error::InvalidParameter(format!(
                        "Invalid nonce length {} expected {}",
                        nonce.len(),
                        $noncelen
                    )));
                }
                Ok(Self {
                    key: Self::key_from_slice(key)?,
                    nonce: Self::nonce_from_slice(&nonce[..$noncelen])?,
                })
            }

            fn key_len() -> usize {
                $keylen
            }

            fn nonce_len() -> usize {
                $noncelen
            }

            fn tag_len() -> usize {
                $taglen
            }

            fn key_slice(&self) -> &[u8] {
                &self.key
            }

            fn nonce_slice(&self) -> &[u8] {
                &self.nonce
            }

            /// convert slice to Key, with error handling
            fn key_from_slice(key: &[u8]) -> Result<[u8; $keylen], Error> {
                if key.len() != $keylen {
                    return Err(Error::InvalidParameter(format!(
                        "Invalid key length {}",
                        key.len()
                    )));
                }
                let mut k = [0u8; $keylen];
                k.copy_from_slice(key);
                Ok(k)
            }

            /// convert slice to Nonce, with error handling
            fn nonce_from_slice(nonce: &[u8]) -> Result<[u8; $noncelen], Error> {
                if nonce.len() != $noncelen {
                    return Err(Error::InvalidParameter(format!(
                        "Invalid nonce length {} expected {}",
                        nonce.len(),
                        $noncelen
                    )));
                }
                let mut n = [0u8; $noncelen];
                n.copy_from_slice(nonce);
                Ok(n)
            }
        }

        /// Implement Display for KeyBox that prevents accidental logging of secret key
        impl fmt::Display for KeyBox {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    f,
                    "(Key:{}B:SECRET, Nonce:{}B:{})",
                    $keylen,
                    $noncelen,
                    hex::encode(self.nonce_slice()),
                )
            }
        }

        impl fmt::Debug for KeyBox {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(self, f)
            }
        }
    };
}

/// implementation methods for Cipher
macro_rules! cipher_impl {
    () => {
        /// number of bytes in nonce for this cipher
        fn nonce_len(&self) -> usize {
            KeyBox::nonce_len()
        }

        /// number of bytes in key for this cipher
        fn key_len(&self) -> usize {
            KeyBox::key_len()
        }

        fn tag_len(&self) -> usize {
            KeyBox::tag_len()
        }

        /// return nonce as slice
        fn get_nonce(&self) -> &[u8] {
            self.kbox.nonce_slice()
        }
    };
}
