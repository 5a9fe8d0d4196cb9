//! SHA-256 utilities: the unlock-key folding primitive and the decimal
//! device-public-key fingerprint shown to the user for manual verification
//! (§4.C).

use sha2::{Digest, Sha256};

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 truncated to the leading 16 bytes.
pub fn sha256_trunc16(data: &[u8]) -> [u8; 16] {
    let full = sha256(data);
    let mut out = [0u8; 16];
    out.copy_from_slice(&full[..16]);
    out
}

/// `device_public_key_fingerprint = SHA256(device_pub_raw || activation_id)`
/// truncated to 8 decimal digits, grouped in fours — e.g. "1234 5678".
///
/// Uses the leading 4 bytes of the hash as a big-endian u32, reduced mod
/// 10^8, so the result always fits in 8 digits.
pub fn decimal_fingerprint(device_pub_raw: &[u8], activation_id: &str) -> String {
    let mut buf = Vec::with_capacity(device_pub_raw.len() + activation_id.len());
    buf.extend_from_slice(device_pub_raw);
    buf.extend_from_slice(activation_id.as_bytes());
    let digest = sha256(&buf);

    let n = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) % 100_000_000;
    let digits = format!("{n:08}");
    format!("{} {}", &digits[..4], &digits[4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_eight_digits_grouped() {
        let fp = decimal_fingerprint(&[1, 2, 3, 4], "activation-id-1");
        let digits: String = fp.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(digits.len(), 8);
        assert!(digits.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(fp.len(), 9); // 8 digits + one space
    }

    #[test]
    fn fingerprint_changes_with_activation_id() {
        let a = decimal_fingerprint(&[1, 2, 3, 4], "id-a");
        let b = decimal_fingerprint(&[1, 2, 3, 4], "id-b");
        assert_ne!(a, b);
    }
}
