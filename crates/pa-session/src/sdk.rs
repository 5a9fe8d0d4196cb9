//! `PowerAuthSdk` — the facade (§5, §9). Orchestrates: acquire the lock,
//! prepare a signed request, release the lock, await the transport,
//! re-acquire the lock to apply the response. No suspension point happens
//! while the lock is held.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use parking_lot::Mutex;

use pa_crypto::{aes_cbc, ecdh, Key16};
use pa_proto::auth::{PowerAuthAuthentication, SignatureUnlockKeys};
use pa_proto::factor::FactorCombination;
use pa_proto::wire::{ActivationCreateRequest, ActivationCreateResponse};

use crate::activation::{Step1Output, Step2Input, Step2Output};
use crate::config::SessionSetup;
use crate::error::PowerAuthError;
use crate::persistence::PersistenceAdapter;
use crate::signature::{RequestBody, SignedRequest};
use crate::state::Session;
use crate::transport::PowerAuthTransport;

pub struct PowerAuthSdk<P: PersistenceAdapter, T: PowerAuthTransport> {
    session: Mutex<Session>,
    persistence: P,
    transport: T,
}

impl<P: PersistenceAdapter, T: PowerAuthTransport> PowerAuthSdk<P, T> {
    /// Builds the session from `setup` and whatever serialized blob the
    /// persistence adapter already holds for `setup.instance_id` (§3's
    /// lifecycle: "created at startup from setup and an optional
    /// serialized blob").
    pub async fn new(setup: SessionSetup, persistence: P, transport: T) -> Result<Self, PowerAuthError> {
        let instance_id = setup.instance_id.clone();
        let mut session = Session::new(setup);

        if let Some(bytes) = persistence.load(&instance_id).await? {
            match crate::serialize::deserialize_state(&bytes) {
                Ok(state) => session.set_state(state),
                Err(e) => {
                    tracing::warn!(instance = %instance_id, error = %e, "stored session blob is corrupt; starting Broken");
                    session.destroy();
                }
            }
        }

        Ok(PowerAuthSdk {
            session: Mutex::new(session),
            persistence,
            transport,
        })
    }

    async fn persist(&self) {
        let (instance_id, bytes) = {
            let session = self.session.lock();
            (
                session.setup.instance_id.clone(),
                crate::serialize::serialize_state(session.state()),
            )
        };
        if let Err(e) = self.persistence.save(&instance_id, &bytes).await {
            // §4.F: a failed save does not undo the in-memory mutation.
            tracing::warn!(instance = %instance_id, error = %e, "session save failed; continuing with in-memory state");
        }
    }

    pub fn has_valid_activation(&self) -> bool {
        self.session.lock().has_valid_activation()
    }

    pub fn has_pending_activation(&self) -> bool {
        self.session.lock().has_pending_activation()
    }

    /// Step 1 + the `/pa/activation/create` round trip + step 2. Returns
    /// the fingerprint and derived keys for the caller to show the user
    /// and collect enrollment factors before calling `commit_activation`.
    pub async fn create_activation(
        &self,
        activation_code: &str,
        activation_name: &str,
        extras: Option<String>,
    ) -> Result<(ActivationCreateResponse, Step2Output), PowerAuthError> {
        let step1: Step1Output = {
            let mut session = self.session.lock();
            session.activation_step1(activation_code)?
        };
        self.persist().await;

        let request = ActivationCreateRequest {
            activation_id_short: step1.activation_id_short.clone(),
            activation_name: activation_name.to_string(),
            activation_nonce: B64.encode(step1.activation_nonce),
            application_key: self.session.lock().setup.application_key.clone(),
            application_signature: B64.encode(step1.application_signature),
            encrypted_device_public_key: B64.encode(&step1.encrypted_device_public_key),
            ephemeral_public_key: B64.encode(&step1.ephemeral_public_key),
            extras,
        };
        let response = self.transport.activation_create(request).await?;

        let server_ephemeral_public_key = B64
            .decode(&response.ephemeral_public_key)
            .map_err(|e| PowerAuthError::InvalidActivationData(e.to_string()))?;
        let encrypted_server_public_key = B64
            .decode(&response.encrypted_server_public_key)
            .map_err(|e| PowerAuthError::InvalidActivationData(e.to_string()))?;
        let encrypted_server_public_key_signature = B64
            .decode(&response.encrypted_server_public_key_signature)
            .map_err(|e| PowerAuthError::InvalidActivationData(e.to_string()))?;
        let server_nonce_vec = B64
            .decode(&response.activation_nonce)
            .map_err(|e| PowerAuthError::InvalidActivationData(e.to_string()))?;
        let server_nonce: [u8; 16] = server_nonce_vec
            .try_into()
            .map_err(|_| PowerAuthError::InvalidActivationData("server nonce must be 16 bytes".into()))?;

        let step2_input = Step2Input {
            activation_id: response.activation_id.clone(),
            server_nonce,
            server_ephemeral_public_key,
            encrypted_server_public_key,
            encrypted_server_public_key_signature,
        };

        let step2_result = {
            let mut session = self.session.lock();
            session.activation_step2(step2_input)
        };
        self.persist().await;

        let step2 = step2_result?;
        Ok((response, step2))
    }

    /// Step 3. `server_public_key_bytes` is the SEC1 point recovered
    /// during step 2 — re-derived here rather than threaded through
    /// `Step2Output` so that output stays free of raw key material the
    /// caller does not need.
    pub async fn commit_activation(
        &self,
        activation_id: String,
        server_public_key_bytes: &[u8],
        step2: &Step2Output,
        unlock_keys: &SignatureUnlockKeys,
    ) -> Result<(), PowerAuthError> {
        let server_public_key = ecdh::public_key_from_bytes(server_public_key_bytes)?;
        {
            let mut session = self.session.lock();
            session.activation_commit(activation_id, server_public_key, step2, unlock_keys)?;
        }
        self.persist().await;
        Ok(())
    }

    /// §4.D: sign one HTTP request for an endpoint this crate does not
    /// otherwise know about. The caller attaches `header_value` to their
    /// own transport call.
    pub async fn sign(
        &self,
        method: &str,
        uri_id: &str,
        body: RequestBody,
        auth: PowerAuthAuthentication,
    ) -> Result<SignedRequest, PowerAuthError> {
        let signed = {
            let mut session = self.session.lock();
            session.sign_request(method, uri_id, &body, &auth)?
        };
        self.persist().await;
        Ok(signed)
    }

    /// The factor combination to gate a vault-unlock call with: possession
    /// and knowledge are always proven, and biometry is folded in whenever
    /// the caller supplied a biometry key, so a caller with all three
    /// factors enrolled can prove all three rather than being capped at
    /// two (§3 places no restriction against combining all three).
    fn vault_gate_factors(unlock_keys: &SignatureUnlockKeys) -> FactorCombination {
        if unlock_keys.biometry_key.is_some() {
            FactorCombination::PossessionKnowledgeBiometry
        } else {
            FactorCombination::PossessionKnowledge
        }
    }

    /// §4.E: obtain a one-shot `K_vault` via a signed `/pa/vault/unlock`
    /// request. `unlock_keys` must include the possession key (to both
    /// sign the request and unwrap `K_transport`) and, for operations
    /// that need knowledge-factor proof, the password.
    async fn vault_unlock(
        &self,
        factors: FactorCombination,
        unlock_keys: SignatureUnlockKeys,
    ) -> Result<Key16, PowerAuthError> {
        let possession_unlock_key = unlock_keys.possession_key.ok_or_else(|| {
            PowerAuthError::InvalidActivationData("possession key required for vault-unlock".into())
        })?;

        let auth = PowerAuthAuthentication::for_vault_unlock(factors, unlock_keys);
        let signed = {
            let mut session = self.session.lock();
            session.sign_request("POST", "/pa/vault/unlock", &RequestBody::Raw(Vec::new()), &auth)?
        };
        self.persist().await;

        let response = self.transport.vault_unlock(&signed.header_value).await?;
        let encrypted_vault_key = B64
            .decode(&response.encrypted_vault_encryption_key)
            .map_err(|e| PowerAuthError::InvalidActivationData(e.to_string()))?;

        let k_transport_bytes = {
            let session = self.session.lock();
            let envelope_transport = session.active()?.envelope_transport.clone();
            aes_cbc::decrypt_zero_iv(&possession_unlock_key, &envelope_transport)?
        };
        let k_transport: [u8; 16] = k_transport_bytes
            .try_into()
            .map_err(|_| PowerAuthError::InvalidActivationData("K_transport must be 16 bytes".into()))?;

        let k_vault_bytes = aes_cbc::decrypt_zero_iv(&k_transport, &encrypted_vault_key)?;
        let k_vault: [u8; 16] = k_vault_bytes
            .try_into()
            .map_err(|_| PowerAuthError::InvalidActivationData("K_vault must be 16 bytes".into()))?;
        Ok(Key16(k_vault))
    }

    /// §4.E "derive key at index i".
    pub async fn fetch_encryption_key(
        &self,
        unlock_keys: SignatureUnlockKeys,
        index: u64,
    ) -> Result<Key16, PowerAuthError> {
        let factors = Self::vault_gate_factors(&unlock_keys);
        let k_vault = self.vault_unlock(factors, unlock_keys).await?;
        Ok(crate::vault_unlock::derive_encryption_key(&k_vault, index))
    }

    /// §4.E validated password change: the vault-unlock round trip
    /// (signed with the knowledge factor) is itself the proof that `old`
    /// was correct.
    pub async fn change_password_validated(
        &self,
        gate_unlock_keys: SignatureUnlockKeys,
        old: &[u8],
        new: &[u8],
    ) -> Result<(), PowerAuthError> {
        let factors = Self::vault_gate_factors(&gate_unlock_keys);
        let _k_vault = self.vault_unlock(factors, gate_unlock_keys).await?;
        {
            let mut session = self.session.lock();
            session.change_user_password_validated(old, new)?;
        }
        self.persist().await;
        Ok(())
    }

    /// §4.E "add biometry after activation".
    pub async fn add_biometry(
        &self,
        gate_unlock_keys: SignatureUnlockKeys,
        biometry_unlock_key: Key16,
    ) -> Result<(), PowerAuthError> {
        let factors = Self::vault_gate_factors(&gate_unlock_keys);
        let k_vault = self.vault_unlock(factors, gate_unlock_keys).await?;
        {
            let mut session = self.session.lock();
            session.add_biometry_factor_post_activation(&k_vault, &biometry_unlock_key)?;
        }
        self.persist().await;
        Ok(())
    }

    /// §4.E "sign with device private key". The vault-unlock round trip
    /// is the authorization gate; the key itself is unwrapped via
    /// `K_transport`, not the returned `K_vault` — see the
    /// device-private-key-envelope design decision.
    pub async fn sign_with_device_key(
        &self,
        gate_unlock_keys: SignatureUnlockKeys,
        possession_unlock_key: [u8; 16],
        payload: &[u8],
    ) -> Result<Vec<u8>, PowerAuthError> {
        let factors = Self::vault_gate_factors(&gate_unlock_keys);
        let _k_vault = self.vault_unlock(factors, gate_unlock_keys).await?;
        let session = self.session.lock();
        session.sign_with_device_private_key(&possession_unlock_key, payload)
    }

    /// Removes the activation both server-side and locally.
    pub async fn remove_activation(
        &self,
        unlock_keys: SignatureUnlockKeys,
    ) -> Result<(), PowerAuthError> {
        let auth = PowerAuthAuthentication::new(FactorCombination::Possession, unlock_keys);
        let signed = {
            let mut session = self.session.lock();
            session.sign_request(
                "POST",
                "/pa/activation/remove",
                &RequestBody::Raw(Vec::new()),
                &auth,
            )?
        };
        self.persist().await;
        self.transport.activation_remove(&signed.header_value).await?;

        let instance_id = {
            let mut session = self.session.lock();
            session.reset();
            session.setup.instance_id.clone()
        };
        if let Err(e) = self.persistence.remove(&instance_id).await {
            tracing::warn!(instance = %instance_id, error = %e, "failed to remove persisted session");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;
    use crate::transport::PowerAuthTransport;
    use async_trait::async_trait;
    use p256::SecretKey;
    use pa_proto::wire::{
        ActivationCreateRequest, ActivationCreateResponse, ActivationRemoveResponse,
        ActivationStatusResponse, VaultUnlockResponse,
    };
    use rand_core::OsRng;

    struct NoopTransport;

    #[async_trait]
    impl PowerAuthTransport for NoopTransport {
        async fn activation_create(
            &self,
            _request: ActivationCreateRequest,
        ) -> Result<ActivationCreateResponse, PowerAuthError> {
            unimplemented!("not exercised by these tests")
        }

        async fn activation_status(
            &self,
            _activation_id: &str,
        ) -> Result<ActivationStatusResponse, PowerAuthError> {
            unimplemented!("not exercised by these tests")
        }

        async fn vault_unlock(
            &self,
            _authorization_header: &str,
        ) -> Result<VaultUnlockResponse, PowerAuthError> {
            unimplemented!("not exercised by these tests")
        }

        async fn activation_remove(
            &self,
            _authorization_header: &str,
        ) -> Result<ActivationRemoveResponse, PowerAuthError> {
            unimplemented!("not exercised by these tests")
        }
    }

    fn sdk_setup() -> SessionSetup {
        SessionSetup::new(
            "app-key",
            b"app-secret".to_vec(),
            SecretKey::random(&mut OsRng).public_key(),
            "instance-1",
        )
        .unwrap()
    }

    #[test]
    fn vault_gate_widens_to_three_factors_when_biometry_supplied() {
        let without_biometry = SignatureUnlockKeys::new().with_possession([1u8; 16]);
        assert_eq!(
            PowerAuthSdk::<InMemoryPersistence, NoopTransport>::vault_gate_factors(&without_biometry),
            FactorCombination::PossessionKnowledge
        );

        let with_biometry = SignatureUnlockKeys::new()
            .with_possession([1u8; 16])
            .with_biometry([2u8; 16]);
        assert_eq!(
            PowerAuthSdk::<InMemoryPersistence, NoopTransport>::vault_gate_factors(&with_biometry),
            FactorCombination::PossessionKnowledgeBiometry
        );
    }

    #[tokio::test]
    async fn remove_activation_persists_before_calling_transport() {
        let setup = sdk_setup();
        let sdk = PowerAuthSdk::new(setup, InMemoryPersistence::default(), NoopTransport)
            .await
            .unwrap();

        // No activation present, so signing fails before any transport
        // call or persist — this only exercises that the method itself
        // compiles against the persist-then-transport ordering and that a
        // missing activation surfaces as an error rather than panicking.
        let err = sdk
            .remove_activation(SignatureUnlockKeys::new().with_possession([1u8; 16]))
            .await
            .unwrap_err();
        assert!(matches!(err, PowerAuthError::MissingActivation));
    }
}
