//! `Session` (§3, §4.B): the central entity. Exactly one of the state
//! discriminants holds at any time; transitions are `Empty -> Pending ->
//! Active`, `Active -> Empty` (reset), and `* -> Broken` (terminal until
//! reset).

use p256::PublicKey;
use pa_crypto::ecdh::KeyPair;
use pa_crypto::{aes_cbc, kdf, Key16};

use crate::config::SessionSetup;
use crate::error::PowerAuthError;

/// Intermediate material kept while an activation handshake is in flight
/// (§4.C step 1).
pub struct PendingActivation {
    pub device_keypair: KeyPair,
    pub activation_id_short: String,
    pub activation_otp: String,
    pub client_nonce: [u8; 16],
}

/// The four long-lived factor-key envelopes plus bookkeeping held once a
/// device is enrolled (§4.C step 3, §4.D).
pub struct ActiveActivation {
    pub activation_id: String,
    pub server_public_key: PublicKey,
    /// Retained as the PBKDF2 salt for the knowledge factor — see the
    /// "knowledge PBKDF2 salt retention" design decision.
    pub activation_id_short: String,
    pub envelope_possession: Vec<u8>,
    pub envelope_knowledge: Vec<u8>,
    pub envelope_biometry: Option<Vec<u8>>,
    /// Wrapped under the possession unlock key — see the "transport key
    /// envelope" design decision.
    pub envelope_transport: Vec<u8>,
    /// The device's P-256 signing key, wrapped under `K_transport` — see
    /// the "device private key envelope" design decision. Used only by
    /// the vault-gated sign-with-device-private-key operation (§4.E).
    pub envelope_device_private_key: Vec<u8>,
    pub counter: u64,
}

pub enum ActivationState {
    Empty,
    Pending(PendingActivation),
    Active(ActiveActivation),
    Broken,
}

impl ActivationState {
    pub fn tag(&self) -> &'static str {
        match self {
            ActivationState::Empty => "Empty",
            ActivationState::Pending(_) => "Pending",
            ActivationState::Active(_) => "Active",
            ActivationState::Broken => "Broken",
        }
    }
}

pub struct Session {
    pub setup: SessionSetup,
    pub(crate) state: ActivationState,
}

impl Session {
    /// A `Session` built from a validated `SessionSetup` can never observe
    /// `!has_valid_setup()` — the check happened at `SessionSetup::new`.
    pub fn new(setup: SessionSetup) -> Self {
        Session {
            setup,
            state: ActivationState::Empty,
        }
    }

    pub fn state(&self) -> &ActivationState {
        &self.state
    }

    pub fn has_valid_setup(&self) -> bool {
        true
    }

    pub fn has_pending_activation(&self) -> bool {
        matches!(self.state, ActivationState::Pending(_))
    }

    pub fn has_valid_activation(&self) -> bool {
        matches!(self.state, ActivationState::Active(_))
    }

    pub fn has_biometry_factor(&self) -> bool {
        matches!(
            &self.state,
            ActivationState::Active(a) if a.envelope_biometry.is_some()
        )
    }

    pub fn is_broken(&self) -> bool {
        matches!(self.state, ActivationState::Broken)
    }

    pub(crate) fn active(&self) -> Result<&ActiveActivation, PowerAuthError> {
        match &self.state {
            ActivationState::Active(a) => Ok(a),
            other => Err(PowerAuthError::invalid_state("Active", other.tag())),
        }
    }

    pub(crate) fn active_mut(&mut self) -> Result<&mut ActiveActivation, PowerAuthError> {
        match &mut self.state {
            ActivationState::Active(a) => Ok(a),
            other => Err(PowerAuthError::invalid_state("Active", other.tag())),
        }
    }

    pub(crate) fn pending(&self) -> Result<&PendingActivation, PowerAuthError> {
        match &self.state {
            ActivationState::Pending(p) => Ok(p),
            other => Err(PowerAuthError::invalid_state("Pending", other.tag())),
        }
    }

    pub(crate) fn set_state(&mut self, state: ActivationState) {
        self.state = state;
    }

    /// Transitions to *Empty*, zeroizing any in-memory key material (the
    /// old `ActivationState` is dropped, running every `ZeroizeOnDrop`
    /// impl it owns).
    pub fn reset(&mut self) {
        tracing::debug!(instance = %self.setup.instance_id, "resetting session to Empty");
        self.state = ActivationState::Empty;
    }

    /// Zeroizes and marks the session terminally unusable. Unlike `reset`,
    /// the session does not become usable again without a fresh
    /// activation handshake on a *new* `Session`.
    pub fn destroy(&mut self) {
        tracing::debug!(instance = %self.setup.instance_id, "destroying session");
        self.state = ActivationState::Broken;
    }

    /// Locally re-encrypts the knowledge envelope under a new password.
    /// Does **not** validate `old` — a successful call with the wrong
    /// `old` password silently produces an envelope that decrypts to
    /// garbage under `new`; see the vault-unlock validated password
    /// change (§4.E) for the version that does validate.
    pub fn change_user_password(&mut self, old: &[u8], new: &[u8]) -> Result<(), PowerAuthError> {
        let salt = self.active()?.activation_id_short.clone();
        let old_unlock = kdf::knowledge_unlock_key(old, salt.as_bytes());
        let new_unlock = kdf::knowledge_unlock_key(new, salt.as_bytes());

        let active = self.active_mut()?;
        let k_know = aes_cbc::decrypt_zero_iv(old_unlock.as_bytes(), &active.envelope_knowledge)
            .map_err(|e| PowerAuthError::InvalidActivationData(e.to_string()))?;
        active.envelope_knowledge = aes_cbc::encrypt_zero_iv(new_unlock.as_bytes(), &k_know);
        Ok(())
    }

    /// Wraps an already-unwrapped biometry factor key under a biometry
    /// unlock key (§4.E "add biometry").
    pub(crate) fn add_biometry_factor(
        &mut self,
        k_signature_biometry: &Key16,
        biometry_unlock_key: &Key16,
    ) -> Result<(), PowerAuthError> {
        let active = self.active_mut()?;
        active.envelope_biometry = Some(aes_cbc::encrypt_zero_iv(
            biometry_unlock_key.as_bytes(),
            k_signature_biometry.as_bytes(),
        ));
        Ok(())
    }

    pub fn remove_biometry_factor(&mut self) -> Result<(), PowerAuthError> {
        let active = self.active_mut()?;
        active.envelope_biometry = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::SecretKey;
    use rand_core::OsRng;

    fn setup() -> SessionSetup {
        SessionSetup::new(
            "app-key",
            b"app-secret".to_vec(),
            SecretKey::random(&mut OsRng).public_key(),
            "instance-1",
        )
        .unwrap()
    }

    fn active_session() -> Session {
        let mut session = Session::new(setup());
        session.set_state(ActivationState::Active(ActiveActivation {
            activation_id: "act-1".into(),
            server_public_key: SecretKey::random(&mut OsRng).public_key(),
            activation_id_short: "AAAAAAAAAA".into(),
            envelope_possession: vec![0u8; 32],
            envelope_knowledge: aes_cbc::encrypt_zero_iv(
                kdf::knowledge_unlock_key(b"1234", b"AAAAAAAAAA").as_bytes(),
                &[7u8; 16],
            ),
            envelope_biometry: None,
            envelope_transport: vec![0u8; 32],
            envelope_device_private_key: vec![0u8; 48],
            counter: 0,
        }));
        session
    }

    #[test]
    fn reset_clears_activation() {
        let mut session = active_session();
        assert!(session.has_valid_activation());
        session.reset();
        assert!(!session.has_valid_activation());
        assert!(!session.has_pending_activation());
        assert!(session.has_valid_setup());
    }

    #[test]
    fn change_password_swaps_the_envelope_without_validating_old() {
        let mut session = active_session();
        session.change_user_password(b"1234", b"5678").unwrap();

        let new_unlock = kdf::knowledge_unlock_key(b"5678", b"AAAAAAAAAA");
        let recovered = aes_cbc::decrypt_zero_iv(
            new_unlock.as_bytes(),
            &session.active().unwrap().envelope_knowledge,
        )
        .unwrap();
        assert_eq!(recovered, vec![7u8; 16]);
    }

    #[test]
    fn biometry_factor_round_trips() {
        let mut session = active_session();
        assert!(!session.has_biometry_factor());
        let key = Key16([9u8; 16]);
        let unlock = Key16([1u8; 16]);
        session.add_biometry_factor(&key, &unlock).unwrap();
        assert!(session.has_biometry_factor());
        session.remove_biometry_factor().unwrap();
        assert!(!session.has_biometry_factor());
    }
}
