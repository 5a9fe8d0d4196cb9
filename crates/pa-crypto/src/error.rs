use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    #[error("AES-CBC encryption failed")]
    AesEncrypt,

    #[error("AES-CBC decryption failed (padding or length mismatch — possible tampering)")]
    AesDecrypt,

    #[error("ECDSA signature verification failed")]
    SignatureVerification,

    #[error("ECDSA signing failed: {0}")]
    SigningFailed(String),

    #[error("ECDH key agreement failed: {0}")]
    KeyAgreement(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),

    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
