/// Cipher implementation of AES-GCM (Galois/Counter Mode) with 256-bit keys
pub mod aesgcm256 {

    // `RUSTFLAGS="-Ctarget-cpu=sandybridge -Ctarget-feature=+aes,+sse2,+sse4.1,+ssse3"`
    use crate::{
        ciphers::{AuthTag, Cipher},
        error::{Error, Result},
    };
    use aes_gcm::{
        aead::{generic_array::GenericArray, Aead, AeadInPlace, KeyInit, Payload},
        Aes256Gcm,
    };
    use bytes::Bytes;
    use std::fmt;
    use zeroize::{Zeroize, ZeroizeOnDrop};

    /// Number of bytes in encryption key for AES_GCM (256 bits = 32 bytes)
    pub const KEYBYTES: usize = 32;
    /// Number of bytes in nonce (96 bits = 12 bytes)
    pub const NONCEBYTES: usize = 12;
    /// Number of bytes in auth integrity tag
    pub const TAGBYTES: usize = 16;

    cipher_keybox!(KEYBYTES, NONCEBYTES, TAGBYTES);

    /// Cipher implementation of AES-GCM (Galois/Counter Mode) with 256-bit keys
    /// with optional architecture-specific hardware acceleration
    /// encryption implemented by [RustCrypto](https://github.com/RustCrypto/AEADs)
    ///
    /// When targeting modern x86/x86_64 CPUs, use the `RUSTFLAGS` above to
    /// take advantage of high performance AES-NI and CLMUL CPU intrinsics.
    pub struct AesGcm256 {
        kbox: KeyBox,
        aesgcm: Aes256Gcm,
    }

    /// Implementation of Debug that doesn't print key to prevent accidental leaks via logging
    impl fmt::Debug for AesGcm256 {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.debug_struct("AesGcm256")
                .field("kbox", &self.kbox)
                .finish()
        }
    }

    impl AesGcm256 {
        /// Initialize cipher with provided key and nonce
        /// key length must be exactly KEYBYTES. nonce length must be >= NONCEBYTES
        pub fn init_from(key: &[u8], nonce: &[u8]) -> Result<Self, Error> {
            let kbox = KeyBox::init(key, nonce)?;
            let aesgcm = Aes256Gcm::new(GenericArray::from_slice(kbox.key_slice()));
            Ok(Self { kbox, aesgcm })
        }
    }

    impl Cipher for AesGcm256 {
        // implementation of functions: nonce_len, key_len, tag_len, get_nonce
        cipher_impl!();

        fn seal(&self, plaintext: &[u8], aad: Option<&[u8]>) -> Result<Bytes, Error> {
            let payload = Payload {
                msg: plaintext,
                aad: aad.unwrap_or(&[]),
            };
            Ok(Bytes::from(self.aesgcm.encrypt(
                GenericArray::from_slice(self.kbox.nonce_slice()),
                payload,
            )?))
        }

        fn open(&self, ciphertext: &[u8], aad: Option<&[u8]>) -> Result<Bytes, Error> {
            let payload = Payload {
                msg: ciphertext,
                aad: aad.unwrap_or(&[]),
            };
            Ok(Bytes::from(self.aesgcm.decrypt(
                GenericArray::from_slice(self.kbox.nonce_slice()),
                payload,
            )?))
        }

        fn seal_detached(&self, buf: &mut [u8], aad: Option<&[u8]>) -> Result<AuthTag, Error> {
            let tag = self.aesgcm.encrypt_in_place_detached(
                GenericArray::from_slice(self.kbox.nonce_slice()),
                aad.unwrap_or(&[]),
                buf,
            )?;
            AuthTag::from_slice(tag.as_slice())
        }

        fn open_detached(
            &self,
            buf: &mut [u8],
            tag: &[u8],
            aad: Option<&[u8]>,
        ) -> Result<(), Error> {
            let tag = AuthTag::from_slice(tag)?;
            self.aesgcm.decrypt_in_place_detached(
                GenericArray::from_slice(self.kbox.nonce_slice()),
                aad.unwrap_or(&[]),
                buf,
                GenericArray::from_slice(tag.get_slice()),
            )?;
            Ok(())
        }
    }
}
