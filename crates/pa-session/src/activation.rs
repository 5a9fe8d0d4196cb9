//! Three-step activation handshake (§4.C).

use p256::PublicKey;
use rand::RngCore;
use rand_core::OsRng;

use pa_crypto::ecdh::{self, KeyPair};
use pa_crypto::{aes_cbc, ecdsa, hash, kdf, mac};
use pa_proto::activation_code::ActivationCode;
use pa_proto::auth::SignatureUnlockKeys;

use crate::error::PowerAuthError;
use crate::state::{ActivationState, ActiveActivation, PendingActivation, Session};

/// Derivation indices for `derive_k(MS, index)` (§4.C step 2).
const INDEX_SIGNATURE_POSSESSION: u64 = 1;
const INDEX_SIGNATURE_KNOWLEDGE: u64 = 2;
const INDEX_SIGNATURE_BIOMETRY: u64 = 3;
const INDEX_TRANSPORT: u64 = 1000;

/// What `step1` hands to the caller to place in the `/pa/activation/create`
/// request body.
#[derive(Debug)]
pub struct Step1Output {
    pub activation_id_short: String,
    pub activation_nonce: [u8; 16],
    pub encrypted_device_public_key: Vec<u8>,
    pub application_signature: [u8; 32],
    pub ephemeral_public_key: Vec<u8>,
    /// Set only by the custom activation variant: the ephemeral P-256
    /// public key used to ECIES-wrap `encrypted_device_public_key` under
    /// the server master public key (§4.C step 1, custom variant). `None`
    /// for the normal, activation-code-driven flow.
    pub envelope_ephemeral_public_key: Option<Vec<u8>>,
}

/// Server response material consumed by `step2`.
pub struct Step2Input {
    pub activation_id: String,
    pub server_nonce: [u8; 16],
    pub server_ephemeral_public_key: Vec<u8>,
    pub encrypted_server_public_key: Vec<u8>,
    pub encrypted_server_public_key_signature: Vec<u8>,
}

/// Derived key material and the human-verifiable fingerprint produced by
/// `step2`, still unwrapped — nothing is persisted until `commit`.
#[derive(Debug)]
pub struct Step2Output {
    pub k_signature_possession: pa_crypto::Key16,
    pub k_signature_knowledge: pa_crypto::Key16,
    pub k_signature_biometry: pa_crypto::Key16,
    pub k_transport: pa_crypto::Key16,
    pub fingerprint: String,
}

impl Session {
    /// §4.C step 1: `Empty -> Pending`.
    pub fn activation_step1(
        &mut self,
        activation_code: &str,
    ) -> Result<Step1Output, PowerAuthError> {
        if !matches!(self.state(), ActivationState::Empty) {
            return Err(PowerAuthError::invalid_state("Empty", self.state().tag()));
        }

        let parsed = ActivationCode::parse(activation_code)?;
        self.begin_pending(parsed.activation_id_short, parsed.activation_otp)
    }

    /// §4.C step 1, custom variant: `activation_id_short` is caller-supplied
    /// base64 of canonicalized identity attributes, `activation_otp` a
    /// caller-supplied secret — no base32/checksum grammar applies. Unlike
    /// the normal flow, the already-OTP-wrapped device public key is
    /// additionally sealed in a non-personalized, ECIES-like envelope under
    /// the server master public key, since there is no activation code to
    /// anchor trust in yet.
    pub fn activation_step1_custom(
        &mut self,
        activation_id_short: String,
        activation_otp: String,
    ) -> Result<Step1Output, PowerAuthError> {
        if !matches!(self.state(), ActivationState::Empty) {
            return Err(PowerAuthError::invalid_state("Empty", self.state().tag()));
        }
        if activation_id_short.is_empty() || activation_otp.is_empty() {
            return Err(PowerAuthError::EncryptionFailed(
                "custom activation requires non-empty identity attributes and secret".into(),
            ));
        }

        let mut output = self.begin_pending(activation_id_short, activation_otp)?;
        let (envelope_ephemeral_public_key, wrapped) = ecdh::ecies_encrypt(
            &self.setup.server_master_public_key,
            &output.encrypted_device_public_key,
        );
        output.encrypted_device_public_key = wrapped;
        output.envelope_ephemeral_public_key = Some(envelope_ephemeral_public_key);
        Ok(output)
    }

    fn begin_pending(
        &mut self,
        activation_id_short: String,
        activation_otp: String,
    ) -> Result<Step1Output, PowerAuthError> {
        let device_keypair = KeyPair::generate();

        let mut client_nonce = [0u8; 16];
        OsRng.fill_bytes(&mut client_nonce);

        let otp_derived_key =
            kdf::knowledge_unlock_key(activation_otp.as_bytes(), activation_id_short.as_bytes());
        let encrypted_device_public_key = aes_cbc::encrypt(
            otp_derived_key.as_bytes(),
            &client_nonce,
            &device_keypair.public_raw_xy(),
        );

        let mut sig_input = Vec::new();
        sig_input.extend_from_slice(activation_id_short.as_bytes());
        sig_input.extend_from_slice(activation_otp.as_bytes());
        sig_input.extend_from_slice(self.setup.application_key.as_bytes());
        let application_signature =
            mac::hmac_sha256(&self.setup.application_secret, &sig_input)?;

        let ephemeral_public_key = device_keypair.public_compressed();

        let output = Step1Output {
            activation_id_short: activation_id_short.clone(),
            activation_nonce: client_nonce,
            encrypted_device_public_key,
            application_signature,
            ephemeral_public_key,
            envelope_ephemeral_public_key: None,
        };

        self.set_state(ActivationState::Pending(PendingActivation {
            device_keypair,
            activation_id_short,
            activation_otp,
            client_nonce,
        }));
        tracing::debug!(instance = %self.setup.instance_id, "activation step1 complete, state -> Pending");

        Ok(output)
    }

    /// §4.C step 2. On ECDSA verification or decryption failure the
    /// session self-resets to *Empty* (§7: "transitions to Broken only on
    /// InvalidActivationData during activation... self-resets to Empty").
    pub fn activation_step2(&mut self, input: Step2Input) -> Result<Step2Output, PowerAuthError> {
        let result = self.try_activation_step2(&input);
        if result.is_err() {
            tracing::warn!(
                instance = %self.setup.instance_id,
                "activation step2 failed cryptographic verification; resetting to Empty"
            );
            self.reset();
        }
        result
    }

    fn try_activation_step2(&self, input: &Step2Input) -> Result<Step2Output, PowerAuthError> {
        let pending = self.pending()?;

        let server_ephemeral_pub = ecdh::public_key_from_bytes(&input.server_ephemeral_public_key)?;

        let mut verify_payload = input.server_ephemeral_public_key.clone();
        verify_payload.extend_from_slice(&input.encrypted_server_public_key);
        ecdsa::verify(
            &self.setup.server_master_public_key,
            &verify_payload,
            &input.encrypted_server_public_key_signature,
        )?;

        let shared_ephemeral = pending.device_keypair.agree(&server_ephemeral_pub);
        let s16 = ecdh::derive_master_secret(&shared_ephemeral);
        let server_pub_bytes = aes_cbc::decrypt(&s16, &input.server_nonce, &input.encrypted_server_public_key)?;
        let server_public_key = ecdh::public_key_from_bytes(&server_pub_bytes)?;

        let shared_master = pending.device_keypair.agree(&server_public_key);
        let ms = ecdh::derive_master_secret(&shared_master);

        let k_signature_possession = kdf::derive_k(&ms, INDEX_SIGNATURE_POSSESSION);
        let k_signature_knowledge = kdf::derive_k(&ms, INDEX_SIGNATURE_KNOWLEDGE);
        let k_signature_biometry = kdf::derive_k(&ms, INDEX_SIGNATURE_BIOMETRY);
        let k_transport = kdf::derive_k(&ms, INDEX_TRANSPORT);

        let fingerprint =
            hash::decimal_fingerprint(&pending.device_keypair.public_raw_xy(), &input.activation_id);

        Ok(Step2Output {
            k_signature_possession,
            k_signature_knowledge,
            k_signature_biometry,
            k_transport,
            fingerprint,
        })
    }

    /// §4.C step 3: `Pending -> Active`, `counter` initialized to 0.
    /// Possession is mandatory — see the commit design decision.
    pub fn activation_commit(
        &mut self,
        activation_id: String,
        server_public_key: PublicKey,
        step2: &Step2Output,
        unlock_keys: &SignatureUnlockKeys,
    ) -> Result<(), PowerAuthError> {
        let possession_key = unlock_keys
            .possession_key
            .ok_or(PowerAuthError::PossessionFactorRequired)?;

        let activation_id_short = self.pending()?.activation_id_short.clone();
        let device_secret_bytes = self.pending()?.device_keypair.to_secret_bytes();

        let envelope_possession =
            aes_cbc::encrypt_zero_iv(&possession_key, step2.k_signature_possession.as_bytes());
        // §4.C's transport-key envelope design decision: wrap K_transport
        // under the possession unlock key, since possession is always
        // present at commit.
        let envelope_transport =
            aes_cbc::encrypt_zero_iv(&possession_key, step2.k_transport.as_bytes());

        let envelope_knowledge = match unlock_keys.password() {
            Some(password) => {
                let knowledge_unlock =
                    kdf::knowledge_unlock_key(password, activation_id_short.as_bytes());
                aes_cbc::encrypt_zero_iv(
                    knowledge_unlock.as_bytes(),
                    step2.k_signature_knowledge.as_bytes(),
                )
            }
            None => Vec::new(),
        };

        let envelope_biometry = unlock_keys.biometry_key.map(|biometry_unlock| {
            aes_cbc::encrypt_zero_iv(&biometry_unlock, step2.k_signature_biometry.as_bytes())
        });

        // Device private key envelope design decision: wrap the device's
        // own ECDH/ECDSA key under K_transport (itself possession-gated)
        // rather than K_vault, since K_vault never exists locally outside
        // the lifetime of one vault-unlock call.
        let envelope_device_private_key =
            aes_cbc::encrypt_zero_iv(step2.k_transport.as_bytes(), &device_secret_bytes);

        self.set_state(ActivationState::Active(ActiveActivation {
            activation_id,
            server_public_key,
            activation_id_short,
            envelope_possession,
            envelope_knowledge,
            envelope_biometry,
            envelope_transport,
            envelope_device_private_key,
            counter: 0,
        }));
        tracing::debug!(instance = %self.setup.instance_id, "activation committed, state -> Active");

        Ok(())
    }
}
