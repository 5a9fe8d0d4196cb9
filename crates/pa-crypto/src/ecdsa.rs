//! P-256 ECDSA-SHA256 signing and verification.
//!
//! Used for the server's signature over its ephemeral key in activation
//! step 2, and for device-private-key signing in the vault-unlock derived
//! operation (§4.E).

use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::PublicKey;

use crate::error::CryptoError;

/// Sign `message` (already the raw payload — SHA-256 is applied internally
/// by the P-256 ECDSA implementation via RFC 6979) with a device or
/// server private key.
pub fn sign(secret: &p256::SecretKey, message: &[u8]) -> Vec<u8> {
    let signing_key = SigningKey::from(secret);
    let sig: Signature = signing_key.sign(message);
    sig.to_der().as_bytes().to_vec()
}

/// Verify a DER-encoded ECDSA signature against a SEC1 public key.
pub fn verify(public_key: &PublicKey, message: &[u8], signature_der: &[u8]) -> Result<(), CryptoError> {
    let verifying_key = VerifyingKey::from(public_key);
    let sig = Signature::from_der(signature_der)
        .map_err(|e| CryptoError::InvalidKey(format!("bad DER signature: {e}")))?;
    verifying_key
        .verify(message, &sig)
        .map_err(|_| CryptoError::SignatureVerification)
}
