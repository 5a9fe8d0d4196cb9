//! HTTP signature engine (§4.D): base-string construction, factor unlock,
//! MAC formatting, header emission, counter ratchet.

use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use rand::RngCore;
use rand_core::OsRng;
use std::collections::BTreeMap;

use pa_crypto::{aes_cbc, canon, kdf, mac};
use pa_proto::auth::PowerAuthAuthentication;
use pa_proto::factor::{self, FactorCombination};
use pa_proto::header::{format_header, SignatureHeaderFields};

use crate::error::PowerAuthError;
use crate::state::Session;

/// What the caller sends for a `POST`/`PUT` request, or the pre-canonicalized
/// query map for a `GET` (§4.A/§4.D step 2).
pub enum RequestBody {
    Raw(Vec<u8>),
    Query(BTreeMap<String, String>),
}

impl RequestBody {
    fn to_bytes(&self) -> Vec<u8> {
        match self {
            RequestBody::Raw(bytes) => bytes.clone(),
            RequestBody::Query(map) => canon::canonicalize_query_map(map),
        }
    }
}

#[derive(Debug)]
pub struct SignedRequest {
    pub header_value: String,
    pub nonce: [u8; 16],
}

fn factor_salt(bit: u8, vault: bool) -> [u8; 2] {
    let tag = match bit {
        factor::POSSESSION => 0u8,
        factor::KNOWLEDGE => 1u8,
        factor::BIOMETRY => 2u8,
        _ => unreachable!("factor_salt called with a non-single-factor bit"),
    };
    [tag, if vault { 1 } else { 0 }]
}

/// 8 decimal digits, zero-padded, from the leading 4 bytes of a truncated
/// MAC (§4.D step 4).
fn mac_to_decimal_group(mac: &[u8; 16]) -> String {
    let n = u32::from_be_bytes([mac[0], mac[1], mac[2], mac[3]]) % 100_000_000;
    format!("{n:08}")
}

impl Session {
    /// §4.D: sign one HTTP request. Ratchets the counter exactly once,
    /// inside the same mutable borrow — callers that hold the session lock
    /// across this call and the following transport send get the
    /// "counter incremented even on transport failure" guarantee for free.
    pub fn sign_request(
        &mut self,
        method: &str,
        uri_id: &str,
        body: &RequestBody,
        auth: &PowerAuthAuthentication,
    ) -> Result<SignedRequest, PowerAuthError> {
        let vault = auth.vault_unlock;
        let plain_bits = auth.factors.bits();

        let mut nonce = [0u8; 16];
        OsRng.fill_bytes(&mut nonce);

        let active = self.active()?;
        let application_key = self.setup.application_key.clone();
        let activation_id_short = active.activation_id_short.clone();
        let activation_id = active.activation_id.clone();
        let counter = active.counter;

        let mut base = Vec::new();
        base.extend_from_slice(application_key.as_bytes());
        base.extend_from_slice(b"&");
        base.extend_from_slice(method.as_bytes());
        base.extend_from_slice(b"&");
        base.extend_from_slice(B64.encode(uri_id.as_bytes()).as_bytes());
        base.extend_from_slice(b"&");
        base.extend_from_slice(B64.encode(body.to_bytes()).as_bytes());
        base.extend_from_slice(b"&");
        base.extend_from_slice(B64.encode(nonce).as_bytes());

        let mut counter_be16 = [0u8; 16];
        counter_be16[8..].copy_from_slice(&counter.to_be_bytes());

        let mut digit_groups = Vec::new();
        for bit in [factor::POSSESSION, factor::KNOWLEDGE, factor::BIOMETRY] {
            if plain_bits & bit == 0 {
                continue;
            }
            let key = self.unlock_factor(bit, auth)?;
            let mut signed_data = base.clone();
            signed_data.extend_from_slice(&counter_be16);
            signed_data.extend_from_slice(&factor_salt(bit, vault));
            let mac16 = mac::hmac_sha256_trunc16(key.as_bytes(), &signed_data)?;
            digit_groups.push(mac_to_decimal_group(&mac16));
        }

        if digit_groups.is_empty() {
            return Err(PowerAuthError::SignatureError(
                "no factor selected for signing".into(),
            ));
        }

        let header_fields = SignatureHeaderFields {
            activation_id: &activation_id,
            application_key: &application_key,
            nonce_b64: &B64.encode(nonce),
            factors: auth.factors,
            signature: &digit_groups.join("-"),
        };
        let header_value = format_header(&header_fields);

        self.active_mut()?.counter += 1;
        tracing::debug!(
            instance = %self.setup.instance_id,
            counter,
            "request signed; counter ratcheted"
        );

        Ok(SignedRequest { header_value, nonce })
    }

    fn unlock_factor(
        &self,
        bit: u8,
        auth: &PowerAuthAuthentication,
    ) -> Result<pa_crypto::Key16, PowerAuthError> {
        let active = self.active()?;
        match bit {
            factor::POSSESSION => {
                let unlock = auth.unlock_keys.possession_key.ok_or_else(|| {
                    PowerAuthError::InvalidActivationData("possession key not provided".into())
                })?;
                let k = aes_cbc::decrypt_zero_iv(&unlock, &active.envelope_possession)?;
                Ok(pa_crypto::Key16(k.try_into().map_err(|_| {
                    PowerAuthError::InvalidActivationData("factor key must be 16 bytes".into())
                })?))
            }
            factor::KNOWLEDGE => {
                let password = auth.unlock_keys.password().ok_or_else(|| {
                    PowerAuthError::InvalidActivationData("password not provided".into())
                })?;
                let unlock = kdf::knowledge_unlock_key(password, active.activation_id_short.as_bytes());
                let k = aes_cbc::decrypt_zero_iv(unlock.as_bytes(), &active.envelope_knowledge)?;
                Ok(pa_crypto::Key16(k.try_into().map_err(|_| {
                    PowerAuthError::InvalidActivationData("factor key must be 16 bytes".into())
                })?))
            }
            factor::BIOMETRY => {
                let unlock = auth.unlock_keys.biometry_key.ok_or_else(|| {
                    PowerAuthError::InvalidActivationData("biometry key not provided".into())
                })?;
                let envelope = active.envelope_biometry.as_ref().ok_or_else(|| {
                    PowerAuthError::InvalidActivationData("biometry factor not enrolled".into())
                })?;
                let k = aes_cbc::decrypt_zero_iv(&unlock, envelope)?;
                Ok(pa_crypto::Key16(k.try_into().map_err(|_| {
                    PowerAuthError::InvalidActivationData("factor key must be 16 bytes".into())
                })?))
            }
            _ => unreachable!("unlock_factor called with a non-single-factor bit"),
        }
    }
}
