//! Master key back-ends (SecretKeepers).
//!
//! A SecretKeeper wraps (encrypts) and unwraps a data key with a key-encryption-key it
//! controls. The envelope core only talks to the `SecretKeeper` trait, so back-ends that
//! call out to an external key service live in their own crates and are added to the
//! registry at startup with `<dyn SecretKeeper>::register`.
//!
//! Built-in keepers, registered automatically:
//! - `env:` passphrase from an environment variable ([EnvKeeper](env/struct.EnvKeeper.html))
//! - `file:` passphrase from a file ([FileKeeper](file/struct.FileKeeper.html))
pub mod env;
pub mod file;
pub mod kdf;

mod secretkeeper;
pub use secretkeeper::{scheme_of, SecretKeeper};
