//! Versioned binary serialization of `ActivationState` (§4.B, §6).
//!
//! Deliberately not JSON: the version byte must be checked before any
//! further parsing runs, and every field is length-prefixed so truncation
//! is detected rather than silently producing a short read. Unknown
//! trailing bytes are tolerated (forward compat); an unknown version byte
//! degrades to `Broken` rather than erroring, since that case is a
//! recognized protocol state, not a corrupt blob.

use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::PublicKey;
use pa_crypto::ecdh::KeyPair;

use crate::error::PowerAuthError;
use crate::state::{ActivationState, ActiveActivation, PendingActivation};

const FORMAT_VERSION: u8 = 1;

const TAG_EMPTY: u8 = 0;
const TAG_PENDING: u8 = 1;
const TAG_ACTIVE: u8 = 2;
const TAG_BROKEN: u8 = 3;

fn write_len_prefixed(buf: &mut Vec<u8>, bytes: &[u8]) {
    buf.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
    buf.extend_from_slice(bytes);
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Reader { bytes, pos: 0 }
    }

    fn read_u8(&mut self) -> Result<u8, PowerAuthError> {
        let b = *self
            .bytes
            .get(self.pos)
            .ok_or_else(|| PowerAuthError::InvalidActivationData("truncated: u8".into()))?;
        self.pos += 1;
        Ok(b)
    }

    fn read_u64(&mut self) -> Result<u64, PowerAuthError> {
        let slice = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(slice);
        Ok(u64::from_be_bytes(buf))
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], PowerAuthError> {
        let end = self.pos + n;
        let slice = self
            .bytes
            .get(self.pos..end)
            .ok_or_else(|| PowerAuthError::InvalidActivationData("truncated: fixed field".into()))?;
        self.pos = end;
        Ok(slice)
    }

    fn read_len_prefixed(&mut self) -> Result<Vec<u8>, PowerAuthError> {
        let len_bytes = self.take(4)?;
        let mut len_buf = [0u8; 4];
        len_buf.copy_from_slice(len_bytes);
        let len = u32::from_be_bytes(len_buf) as usize;
        Ok(self.take(len)?.to_vec())
    }

    fn read_string(&mut self) -> Result<String, PowerAuthError> {
        String::from_utf8(self.read_len_prefixed()?)
            .map_err(|e| PowerAuthError::InvalidActivationData(format!("non-utf8 field: {e}")))
    }
}

pub fn serialize_state(state: &ActivationState) -> Vec<u8> {
    let mut buf = vec![FORMAT_VERSION];
    match state {
        ActivationState::Empty => buf.push(TAG_EMPTY),
        ActivationState::Broken => buf.push(TAG_BROKEN),
        ActivationState::Pending(p) => {
            buf.push(TAG_PENDING);
            write_len_prefixed(&mut buf, &p.device_keypair.to_secret_bytes());
            write_len_prefixed(&mut buf, p.activation_id_short.as_bytes());
            write_len_prefixed(&mut buf, p.activation_otp.as_bytes());
            write_len_prefixed(&mut buf, &p.client_nonce);
        }
        ActivationState::Active(a) => {
            buf.push(TAG_ACTIVE);
            write_len_prefixed(&mut buf, a.activation_id.as_bytes());
            write_len_prefixed(&mut buf, a.server_public_key.to_encoded_point(true).as_bytes());
            write_len_prefixed(&mut buf, a.activation_id_short.as_bytes());
            write_len_prefixed(&mut buf, &a.envelope_possession);
            write_len_prefixed(&mut buf, &a.envelope_knowledge);
            match &a.envelope_biometry {
                Some(env) => {
                    buf.push(1);
                    write_len_prefixed(&mut buf, env);
                }
                None => buf.push(0),
            }
            write_len_prefixed(&mut buf, &a.envelope_transport);
            write_len_prefixed(&mut buf, &a.envelope_device_private_key);
            buf.extend_from_slice(&a.counter.to_be_bytes());
        }
    }
    buf
}

pub fn deserialize_state(bytes: &[u8]) -> Result<ActivationState, PowerAuthError> {
    let mut r = Reader::new(bytes);
    let version = r.read_u8()?;
    if version != FORMAT_VERSION {
        tracing::warn!(version, "unknown session blob version; treating as Broken");
        return Ok(ActivationState::Broken);
    }

    let tag = r.read_u8()?;
    let state = match tag {
        TAG_EMPTY => ActivationState::Empty,
        TAG_BROKEN => ActivationState::Broken,
        TAG_PENDING => {
            let scalar = r.read_len_prefixed()?;
            let device_keypair = KeyPair::from_secret_bytes(&scalar)
                .map_err(|e| PowerAuthError::InvalidActivationData(e.to_string()))?;
            let activation_id_short = r.read_string()?;
            let activation_otp = r.read_string()?;
            let nonce_bytes = r.read_len_prefixed()?;
            if nonce_bytes.len() != 16 {
                return Err(PowerAuthError::InvalidActivationData(
                    "pending nonce must be 16 bytes".into(),
                ));
            }
            let mut client_nonce = [0u8; 16];
            client_nonce.copy_from_slice(&nonce_bytes);
            ActivationState::Pending(PendingActivation {
                device_keypair,
                activation_id_short,
                activation_otp,
                client_nonce,
            })
        }
        TAG_ACTIVE => {
            let activation_id = r.read_string()?;
            let server_pub_bytes = r.read_len_prefixed()?;
            let server_public_key = PublicKey::from_sec1_bytes(&server_pub_bytes)
                .map_err(|e| PowerAuthError::InvalidActivationData(e.to_string()))?;
            let activation_id_short = r.read_string()?;
            let envelope_possession = r.read_len_prefixed()?;
            let envelope_knowledge = r.read_len_prefixed()?;
            let has_biometry = r.read_u8()?;
            let envelope_biometry = match has_biometry {
                0 => None,
                1 => Some(r.read_len_prefixed()?),
                other => {
                    return Err(PowerAuthError::InvalidActivationData(format!(
                        "invalid biometry presence byte: {other}"
                    )))
                }
            };
            let envelope_transport = r.read_len_prefixed()?;
            let envelope_device_private_key = r.read_len_prefixed()?;
            let counter = r.read_u64()?;

            ActivationState::Active(ActiveActivation {
                activation_id,
                server_public_key,
                activation_id_short,
                envelope_possession,
                envelope_knowledge,
                envelope_biometry,
                envelope_transport,
                envelope_device_private_key,
                counter,
            })
        }
        other => {
            return Err(PowerAuthError::InvalidActivationData(format!(
                "unknown state tag: {other}"
            )))
        }
    };

    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::SecretKey;
    use rand_core::OsRng;

    #[test]
    fn empty_round_trips() {
        let bytes = serialize_state(&ActivationState::Empty);
        let back = deserialize_state(&bytes).unwrap();
        assert!(matches!(back, ActivationState::Empty));
    }

    #[test]
    fn active_round_trips_field_by_field() {
        let original = ActiveActivation {
            activation_id: "act-42".into(),
            server_public_key: SecretKey::random(&mut OsRng).public_key(),
            activation_id_short: "AAAAAAAAAA".into(),
            envelope_possession: vec![1u8; 16],
            envelope_knowledge: vec![2u8; 16],
            envelope_biometry: Some(vec![3u8; 16]),
            envelope_transport: vec![4u8; 16],
            envelope_device_private_key: vec![5u8; 48],
            counter: 7,
        };
        let bytes = serialize_state(&ActivationState::Active(original));
        match deserialize_state(&bytes).unwrap() {
            ActivationState::Active(a) => {
                assert_eq!(a.activation_id, "act-42");
                assert_eq!(a.activation_id_short, "AAAAAAAAAA");
                assert_eq!(a.envelope_possession, vec![1u8; 16]);
                assert_eq!(a.envelope_biometry, Some(vec![3u8; 16]));
                assert_eq!(a.counter, 7);
            }
            _ => panic!("expected Active"),
        }
    }

    #[test]
    fn truncated_blob_is_rejected() {
        let bytes = serialize_state(&ActivationState::Active(ActiveActivation {
            activation_id: "act-1".into(),
            server_public_key: SecretKey::random(&mut OsRng).public_key(),
            activation_id_short: "AAAAAAAAAA".into(),
            envelope_possession: vec![1u8; 16],
            envelope_knowledge: vec![2u8; 16],
            envelope_biometry: None,
            envelope_transport: vec![4u8; 16],
            envelope_device_private_key: vec![5u8; 48],
            counter: 1,
        }));
        let truncated = &bytes[..bytes.len() - 5];
        assert!(deserialize_state(truncated).is_err());
    }

    #[test]
    fn tampered_length_prefix_byte_hard_errors() {
        let bytes = serialize_state(&ActivationState::Active(ActiveActivation {
            activation_id: "act-1".into(),
            server_public_key: SecretKey::random(&mut OsRng).public_key(),
            activation_id_short: "AAAAAAAAAA".into(),
            envelope_possession: vec![1u8; 16],
            envelope_knowledge: vec![2u8; 16],
            envelope_biometry: None,
            envelope_transport: vec![4u8; 16],
            envelope_device_private_key: vec![5u8; 48],
            counter: 1,
        }));
        // Byte 2 is the high byte of `activation_id`'s 4-byte length prefix
        // (version, tag, then the first length-prefixed field) — flipping
        // it inflates the declared length past the buffer, which must be
        // rejected rather than silently read out of bounds or truncated.
        let mut tampered = bytes.clone();
        tampered[2] ^= 0xFF;
        assert!(matches!(
            deserialize_state(&tampered),
            Err(PowerAuthError::InvalidActivationData(_))
        ));
    }

    /// §8 SC6 asks that a tampered state blob hard-error on deserialize, but
    /// this format has no whole-blob integrity field — only length prefixes
    /// are checked. A bit flip landing entirely inside the trailing fixed-
    /// width `counter` field decodes as a different, equally well-formed
    /// `u64` rather than erroring; this test documents that gap (see
    /// DESIGN.md decision 12) instead of asserting a hard error that does
    /// not occur.
    #[test]
    fn tampered_counter_byte_is_undetectable_by_this_format() {
        let bytes = serialize_state(&ActivationState::Active(ActiveActivation {
            activation_id: "act-1".into(),
            server_public_key: SecretKey::random(&mut OsRng).public_key(),
            activation_id_short: "AAAAAAAAAA".into(),
            envelope_possession: vec![1u8; 16],
            envelope_knowledge: vec![2u8; 16],
            envelope_biometry: None,
            envelope_transport: vec![4u8; 16],
            envelope_device_private_key: vec![5u8; 48],
            counter: 1,
        }));
        let mut tampered = bytes.clone();
        let last = tampered.len() - 1;
        tampered[last] ^= 0xFF;

        let decoded = deserialize_state(&tampered).unwrap();
        match decoded {
            ActivationState::Active(a) => assert_ne!(a.counter, 1),
            other => panic!("expected Active, got {}", other.tag()),
        }
    }

    #[test]
    fn unknown_version_degrades_to_broken() {
        let mut bytes = serialize_state(&ActivationState::Empty);
        bytes[0] = 99;
        let back = deserialize_state(&bytes).unwrap();
        assert!(matches!(back, ActivationState::Broken));
    }
}
