//! AES-128-CBC with PKCS#7 padding, plus the unpadded single-block
//! primitive the `derive_k` key tree (see `kdf`) is built on.
//!
//! Wire format for the padded variants: the caller supplies the IV
//! separately (the protocol embeds it — nonce, server nonce, or an
//! explicit zero IV for at-rest envelopes); we never prepend it here.

use aes::Aes128;
use cbc::cipher::{
    block_padding::Pkcs7, generic_array::GenericArray, BlockDecryptMut, BlockEncrypt,
    BlockEncryptMut, KeyInit, KeyIvInit,
};

use crate::error::CryptoError;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// Encrypt `plaintext` with AES-128-CBC/PKCS7 under `key`/`iv`.
pub fn encrypt(key: &[u8; 16], iv: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    Aes128CbcEnc::new(key.into(), iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt AES-128-CBC/PKCS7 ciphertext produced by [`encrypt`].
pub fn decrypt(key: &[u8; 16], iv: &[u8; 16], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    Aes128CbcDec::new(key.into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::AesDecrypt)
}

/// Encrypt with a zero IV — the envelope format used to wrap signature
/// factor keys at rest (§4.C step 3, §4.E).
pub fn encrypt_zero_iv(key: &[u8; 16], plaintext: &[u8]) -> Vec<u8> {
    encrypt(key, &[0u8; 16], plaintext)
}

/// Decrypt a zero-IV envelope produced by [`encrypt_zero_iv`].
pub fn decrypt_zero_iv(key: &[u8; 16], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    decrypt(key, &[0u8; 16], ciphertext)
}

/// Raw single-block AES-128 encryption with no padding and an implicit
/// zero IV — equivalent to "AES-CBC-encrypt(key, block, zero IV)" for
/// exactly one 16-byte block. This is the primitive the `derive_k`
/// one-block key tree (§4.A) is built on; it must never be used for
/// variable-length data.
pub fn encrypt_block_zero_iv(key: &[u8; 16], block: &[u8; 16]) -> [u8; 16] {
    let cipher = Aes128::new(GenericArray::from_slice(key));
    let mut ga = GenericArray::clone_from_slice(block);
    cipher.encrypt_block(&mut ga);
    let mut out = [0u8; 16];
    out.copy_from_slice(&ga);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_padded() {
        let key = [7u8; 16];
        let iv = [3u8; 16];
        let pt = b"a message that spans more than one AES block of plaintext";
        let ct = encrypt(&key, &iv, pt);
        assert_ne!(ct.len() % 16, pt.len() % 16, "padding must be applied");
        let back = decrypt(&key, &iv, &ct).unwrap();
        assert_eq!(back, pt);
    }

    #[test]
    fn zero_iv_roundtrip() {
        let key = [9u8; 16];
        let pt = [1u8; 16];
        let ct = encrypt_zero_iv(&key, &pt);
        let back = decrypt_zero_iv(&key, &ct).unwrap();
        assert_eq!(back, pt);
    }

    #[test]
    fn decrypt_rejects_tampered_ciphertext() {
        let key = [1u8; 16];
        let iv = [2u8; 16];
        let mut ct = encrypt(&key, &iv, b"0123456789abcdef");
        let last = ct.len() - 1;
        ct[last] ^= 0xFF;
        assert!(decrypt(&key, &iv, &ct).is_err());
    }

    #[test]
    fn single_block_is_deterministic_and_key_dependent() {
        let key_a = [1u8; 16];
        let key_b = [2u8; 16];
        let block = [0u8; 16];
        let out_a1 = encrypt_block_zero_iv(&key_a, &block);
        let out_a2 = encrypt_block_zero_iv(&key_a, &block);
        let out_b = encrypt_block_zero_iv(&key_b, &block);
        assert_eq!(out_a1, out_a2);
        assert_ne!(out_a1, out_b);
    }
}
