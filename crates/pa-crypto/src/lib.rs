//! pa-crypto — PowerAuth client core cryptographic primitives
//!
//! # Design principles
//! - All primitives come from audited RustCrypto / RustCrypto-adjacent crates.
//! - Every function here is pure: no session state, no I/O, no global config.
//! - Secret byte buffers are zeroized on drop.
//!
//! # Module layout
//! - `aes_cbc`  — AES-128-CBC/PKCS7 and the unpadded single-block primitive
//!                used by the `derive_k` key tree
//! - `ecdh`     — P-256 Diffie-Hellman key agreement
//! - `ecdsa`    — P-256 ECDSA sign/verify
//! - `kdf`      — `derive_k`, PBKDF2 knowledge-key derivation, unlock-key
//!                folding from arbitrary entropy
//! - `mac`      — HMAC-SHA256, truncated to the 16-byte signature MAC
//! - `hash`     — SHA-256 helpers, including the decimal-grouped fingerprint
//! - `canon`    — `prepareKeyValueDictionaryForDataSigning` canonicalization
//! - `error`    — unified error type

pub mod aes_cbc;
pub mod canon;
pub mod ecdh;
pub mod ecdsa;
pub mod error;
pub mod hash;
pub mod kdf;
pub mod mac;

pub use error::CryptoError;

/// A 16-byte symmetric key, zeroized on drop. Used for every signature
/// factor key, the transport key, and the ephemeral vault key.
#[derive(Clone, PartialEq, Eq, zeroize::ZeroizeOnDrop)]
pub struct Key16(pub [u8; 16]);

impl Key16 {
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl std::fmt::Debug for Key16 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Key16(..)")
    }
}

impl From<[u8; 16]> for Key16 {
    fn from(b: [u8; 16]) -> Self {
        Key16(b)
    }
}
