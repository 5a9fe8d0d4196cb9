//! Vault-unlock and derived operations (§4.E). These all start from an
//! already-obtained `K_vault`, handed in by the facade after it completes
//! the signed `/pa/vault/unlock` round trip (§5: I/O lives outside the
//! lock-guarded core).

use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::SecretKey;

use pa_crypto::{aes_cbc, kdf, Key16};

use crate::error::PowerAuthError;
use crate::state::Session;

/// `derive_k(K_vault, index)` — custom encryption key at a caller-chosen
/// index (§4.E "derive key at index i").
pub fn derive_encryption_key(k_vault: &Key16, index: u64) -> Key16 {
    kdf::derive_k(k_vault.as_bytes(), index)
}

impl Session {
    /// Decrypts the transport-gated device private key and signs
    /// `SHA256(payload)`-equivalent data with it (P-256 ECDSA applies its
    /// own hashing). Requires a prior successful vault-unlock round trip
    /// as the possession+knowledge authorization gate (§4.E); the device
    /// key itself is unwrapped via `K_transport`, not `K_vault` — see the
    /// device-private-key-envelope design decision.
    pub fn sign_with_device_private_key(
        &self,
        possession_unlock_key: &[u8; 16],
        payload: &[u8],
    ) -> Result<Vec<u8>, PowerAuthError> {
        let active = self.active()?;
        let k_transport_bytes = aes_cbc::decrypt_zero_iv(possession_unlock_key, &active.envelope_transport)?;
        let k_transport: [u8; 16] = k_transport_bytes
            .try_into()
            .map_err(|_| PowerAuthError::InvalidActivationData("K_transport must be 16 bytes".into()))?;

        let device_secret_bytes =
            aes_cbc::decrypt_zero_iv(&k_transport, &active.envelope_device_private_key)?;
        let secret = SecretKey::from_slice(&device_secret_bytes)
            .map_err(|e| PowerAuthError::InvalidActivationData(e.to_string()))?;
        let signing_key = SigningKey::from(&secret);
        let signature: Signature = signing_key.sign(payload);
        Ok(signature.to_der().as_bytes().to_vec())
    }

    /// Validated password change (§4.E): the caller already proved the
    /// old password was correct by successfully obtaining `K_vault`
    /// (the vault-unlock request was signed with the knowledge factor).
    /// This just delegates to the unvalidated local re-key.
    pub fn change_user_password_validated(
        &mut self,
        old: &[u8],
        new: &[u8],
    ) -> Result<(), PowerAuthError> {
        self.change_user_password(old, new)
    }

    /// Add biometry after activation (§4.E): wraps the already-unwrapped
    /// biometry signature key, `derive_k(K_vault, 3)`, under a freshly
    /// platform-provided biometry unlock key.
    pub fn add_biometry_factor_post_activation(
        &mut self,
        k_vault: &Key16,
        biometry_unlock_key: &Key16,
    ) -> Result<(), PowerAuthError> {
        let k_signature_biometry = kdf::derive_k(k_vault.as_bytes(), 3);
        self.add_biometry_factor(&k_signature_biometry, biometry_unlock_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionSetup;
    use crate::state::{ActivationState, ActiveActivation};
    use p256::SecretKey as P256SecretKey;
    use rand_core::OsRng;

    fn active_session() -> (Session, [u8; 16], Key16) {
        let possession_unlock = [4u8; 16];
        let k_transport = Key16([8u8; 16]);
        let device_secret = P256SecretKey::random(&mut OsRng);
        let envelope_transport = aes_cbc::encrypt_zero_iv(&possession_unlock, k_transport.as_bytes());
        let envelope_device_private_key =
            aes_cbc::encrypt_zero_iv(k_transport.as_bytes(), device_secret.to_bytes().as_slice());

        let setup = SessionSetup::new(
            "app-key",
            b"app-secret".to_vec(),
            P256SecretKey::random(&mut OsRng).public_key(),
            "instance-1",
        )
        .unwrap();
        let mut session = Session::new(setup);
        session.set_state(ActivationState::Active(ActiveActivation {
            activation_id: "act-1".into(),
            server_public_key: P256SecretKey::random(&mut OsRng).public_key(),
            activation_id_short: "AAAAAAAAAA".into(),
            envelope_possession: vec![0u8; 16],
            envelope_knowledge: Vec::new(),
            envelope_biometry: None,
            envelope_transport,
            envelope_device_private_key,
            counter: 0,
        }));
        (session, possession_unlock, k_transport)
    }

    #[test]
    fn derive_encryption_key_matches_derive_k() {
        let k_vault = Key16([1u8; 16]);
        let derived = derive_encryption_key(&k_vault, 42);
        assert_eq!(derived.as_bytes(), kdf::derive_k(k_vault.as_bytes(), 42).as_bytes());
    }

    #[test]
    fn sign_with_device_private_key_produces_a_der_signature() {
        let (session, possession_unlock, _k_transport) = active_session();
        let sig = session
            .sign_with_device_private_key(&possession_unlock, b"payload")
            .unwrap();
        assert!(!sig.is_empty());
    }

    #[test]
    fn add_biometry_post_activation_sets_envelope() {
        let (mut session, _possession_unlock, _k_transport) = active_session();
        assert!(!session.has_biometry_factor());
        let k_vault = Key16([9u8; 16]);
        let biometry_unlock = Key16([2u8; 16]);
        session
            .add_biometry_factor_post_activation(&k_vault, &biometry_unlock)
            .unwrap();
        assert!(session.has_biometry_factor());
    }
}
