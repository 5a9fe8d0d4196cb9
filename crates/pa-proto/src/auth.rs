//! Caller-supplied unlock material for a signing or vault-unlock call
//! (§4.D step 3).

use zeroize::Zeroize;

use crate::factor::FactorCombination;

/// Raw unlock inputs for the factors a caller wants to use on a single
/// call. `possession_key` is opaque device-bound entropy the platform
/// layer supplies (key material derivation is not this crate's concern,
/// per the possession-key Open Question); `password` is the plaintext PIN
/// or passphrase, folded into the knowledge unlock key via PBKDF2.
#[derive(Default)]
pub struct SignatureUnlockKeys {
    pub possession_key: Option<[u8; 16]>,
    pub biometry_key: Option<[u8; 16]>,
    password: Option<Vec<u8>>,
}

impl SignatureUnlockKeys {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_possession(mut self, key: [u8; 16]) -> Self {
        self.possession_key = Some(key);
        self
    }

    pub fn with_biometry(mut self, key: [u8; 16]) -> Self {
        self.biometry_key = Some(key);
        self
    }

    pub fn with_password(mut self, password: impl Into<Vec<u8>>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn password(&self) -> Option<&[u8]> {
        self.password.as_deref()
    }
}

impl Drop for SignatureUnlockKeys {
    fn drop(&mut self) {
        self.possession_key.zeroize();
        self.biometry_key.zeroize();
        if let Some(p) = self.password.as_mut() {
            p.zeroize();
        }
    }
}

/// A signing request's factor selection and its unlock material.
///
/// `vault_unlock` ORs the `PREPARE_VAULT_UNLOCK` bit into the derivation
/// salt (§4.E) without changing `factors`' header representation — kept
/// as a separate flag rather than folded into `FactorCombination` so that
/// enum stays an exhaustive, vault-agnostic factor selector.
pub struct PowerAuthAuthentication {
    pub factors: FactorCombination,
    pub unlock_keys: SignatureUnlockKeys,
    pub vault_unlock: bool,
}

impl PowerAuthAuthentication {
    pub fn new(factors: FactorCombination, unlock_keys: SignatureUnlockKeys) -> Self {
        Self {
            factors,
            unlock_keys,
            vault_unlock: false,
        }
    }

    pub fn for_vault_unlock(factors: FactorCombination, unlock_keys: SignatureUnlockKeys) -> Self {
        Self {
            factors,
            unlock_keys,
            vault_unlock: true,
        }
    }
}
