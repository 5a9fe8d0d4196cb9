//! HMAC-SHA256, truncated to 16 bytes for the per-factor signature MAC and
//! for the activation application signature (§4.A, §4.C).

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::CryptoError;

type HmacSha256 = Hmac<Sha256>;

/// Full 32-byte HMAC-SHA256.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32], CryptoError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| CryptoError::KeyDerivation(format!("bad HMAC key: {e}")))?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().into())
}

/// HMAC-SHA256 truncated to the leading 16 bytes — the per-factor
/// signature MAC input before decimal formatting (§4.D step 4).
pub fn hmac_sha256_trunc16(key: &[u8; 16], data: &[u8]) -> Result<[u8; 16], CryptoError> {
    let full = hmac_sha256(key, data)?;
    let mut out = [0u8; 16];
    out.copy_from_slice(&full[..16]);
    Ok(out)
}
