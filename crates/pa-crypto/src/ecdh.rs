//! P-256 (NIST secp256r1) Diffie-Hellman key agreement.
//!
//! The activation handshake (§4.C) needs a *static* device key pair (it is
//! reused between step 1 and step 2, unlike a one-shot ephemeral key), so
//! we work directly with `p256::SecretKey` rather than `EphemeralSecret`.

use p256::ecdh::diffie_hellman;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::{PublicKey, SecretKey};
use rand::RngCore;
use rand_core::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// A device (or ephemeral) P-256 key pair. The secret half is zeroized on
/// drop; the public half is exposed in both SEC1-compressed and
/// uncompressed-raw form since different parts of the protocol want each.
#[derive(ZeroizeOnDrop)]
pub struct KeyPair {
    secret: SecretKey,
    #[zeroize(skip)]
    public: PublicKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secret = SecretKey::random(&mut OsRng);
        let public = secret.public_key();
        Self { secret, public }
    }

    pub fn from_secret_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let secret = SecretKey::from_slice(bytes)
            .map_err(|e| CryptoError::InvalidKey(format!("bad P-256 scalar: {e}")))?;
        let public = secret.public_key();
        Ok(Self { secret, public })
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Raw 32-byte scalar, for persisting a *Pending* activation's
    /// ephemeral device key pair. Zeroized by the caller's own buffer
    /// management once no longer needed.
    pub fn to_secret_bytes(&self) -> Vec<u8> {
        self.secret.to_bytes().to_vec()
    }

    /// SEC1 compressed point (33 bytes) — used on the wire.
    pub fn public_compressed(&self) -> Vec<u8> {
        self.public.to_encoded_point(true).as_bytes().to_vec()
    }

    /// SEC1 uncompressed point minus the leading tag byte (64 bytes) —
    /// used as `device_pub_raw` input to the fingerprint hash (§4.C).
    pub fn public_raw_xy(&self) -> Vec<u8> {
        self.public.to_encoded_point(false).as_bytes()[1..].to_vec()
    }

    /// Raw ECDH shared secret (the full 32-byte x-coordinate). The
    /// protocol truncates this itself where it needs fewer bytes — see
    /// `derive_master_secret`.
    pub fn agree(&self, peer_public: &PublicKey) -> [u8; 32] {
        let shared = diffie_hellman(self.secret.to_nonzero_scalar(), peer_public.as_affine());
        let mut out = [0u8; 32];
        out.copy_from_slice(shared.raw_secret_bytes().as_slice());
        out
    }
}

/// Parse a SEC1 (compressed or uncompressed) P-256 public key.
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    PublicKey::from_sec1_bytes(bytes).map_err(|e| CryptoError::InvalidKey(format!("bad P-256 point: {e}")))
}

/// §4.C: "Derive master secret MS = ECDH(...) reduced to 16 bytes (leftmost)".
/// This is a direct truncation, not a hash — matches the wire protocol the
/// server expects.
pub fn derive_master_secret(shared_secret: &[u8; 32]) -> [u8; 16] {
    let mut ms = [0u8; 16];
    ms.copy_from_slice(&shared_secret[..16]);
    let mut full = *shared_secret;
    full.zeroize();
    ms
}

/// ECIES-like non-personalized envelope (§4.C step 1, custom activation
/// variant): a one-shot ephemeral P-256 key agrees with `recipient_public_key`,
/// the shared secret is reduced to 16 bytes exactly as `derive_master_secret`
/// does for the normal handshake, and `plaintext` is AES-CBC/PKCS7-encrypted
/// under a fresh random nonce. The nonce travels prefixed to the ciphertext;
/// the ephemeral public key is returned separately since the caller needs it
/// alongside the already-OTP-wrapped body, not folded into it.
pub fn ecies_encrypt(recipient_public_key: &PublicKey, plaintext: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let ephemeral = KeyPair::generate();
    let shared = ephemeral.agree(recipient_public_key);
    let key = derive_master_secret(&shared);

    let mut nonce = [0u8; 16];
    OsRng.fill_bytes(&mut nonce);

    let mut envelope = nonce.to_vec();
    envelope.extend_from_slice(&crate::aes_cbc::encrypt(&key, &nonce, plaintext));
    (ephemeral.public_compressed(), envelope)
}

/// Inverse of [`ecies_encrypt`]: recover the plaintext given the recipient's
/// static secret and the envelope's ephemeral public key.
pub fn ecies_decrypt(
    recipient_secret: &SecretKey,
    ephemeral_public_key: &[u8],
    envelope: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if envelope.len() < 16 {
        return Err(CryptoError::AesDecrypt);
    }
    let ephemeral_pub = public_key_from_bytes(ephemeral_public_key)?;
    let shared_point = diffie_hellman(recipient_secret.to_nonzero_scalar(), ephemeral_pub.as_affine());
    let mut shared = [0u8; 32];
    shared.copy_from_slice(shared_point.raw_secret_bytes().as_slice());
    let key = derive_master_secret(&shared);

    let (nonce, ciphertext) = envelope.split_at(16);
    let mut nonce_arr = [0u8; 16];
    nonce_arr.copy_from_slice(nonce);
    crate::aes_cbc::decrypt(&key, &nonce_arr, ciphertext)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecies_roundtrips() {
        let recipient = SecretKey::random(&mut OsRng);
        let (ephemeral_public_key, envelope) =
            ecies_encrypt(&recipient.public_key(), b"custom activation body");
        let plaintext = ecies_decrypt(&recipient, &ephemeral_public_key, &envelope).unwrap();
        assert_eq!(plaintext, b"custom activation body");
    }

    #[test]
    fn ecies_envelope_differs_by_recipient() {
        let a = SecretKey::random(&mut OsRng);
        let b = SecretKey::random(&mut OsRng);
        let (ephemeral_public_key, envelope) = ecies_encrypt(&a.public_key(), b"body");
        assert!(ecies_decrypt(&b, &ephemeral_public_key, &envelope).is_err());
    }

    #[test]
    fn agreement_is_symmetric() {
        let a = KeyPair::generate();
        let b = KeyPair::generate();
        let sa = a.agree(b.public_key());
        let sb = b.agree(a.public_key());
        assert_eq!(sa, sb);
    }

    #[test]
    fn fixed_scalars_round_trip_through_sec1() {
        // Deterministic scalars, matching SC1's seeded device/server keys.
        let mut dev_scalar = [0u8; 32];
        dev_scalar[31] = 0x01;
        let mut srv_scalar = [0u8; 32];
        srv_scalar[31] = 0x02;

        let device = KeyPair::from_secret_bytes(&dev_scalar).unwrap();
        let server = KeyPair::from_secret_bytes(&srv_scalar).unwrap();

        let compressed = device.public_compressed();
        let parsed = public_key_from_bytes(&compressed).unwrap();
        assert_eq!(parsed, *device.public_key());

        let shared = device.agree(server.public_key());
        let ms = derive_master_secret(&shared);
        assert_eq!(ms.len(), 16);
        assert_eq!(server.agree(device.public_key()), shared);
    }
}
