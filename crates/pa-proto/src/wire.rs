//! REST JSON request/response bodies for the four endpoints this core
//! consumes (§6). Transport itself — the HTTP client — is out of scope;
//! these types are what a transport implementation sends and receives.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationCreateRequest {
    pub activation_id_short: String,
    pub activation_name: String,
    pub activation_nonce: String, // base64
    pub application_key: String,
    pub application_signature: String, // base64
    pub encrypted_device_public_key: String, // base64
    pub ephemeral_public_key: String,  // base64
    pub extras: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationCreateResponse {
    pub activation_id: String,
    pub activation_nonce: String,
    pub ephemeral_public_key: String,
    pub encrypted_server_public_key: String,
    pub encrypted_server_public_key_signature: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationStatusRequest {
    pub activation_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationStatusResponse {
    pub encrypted_status_blob: String, // base64, 24 bytes AES-CBC
}

/// Lifecycle value carried in byte 1 of the decrypted status blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerActivationState {
    Created,
    OtpUsed,
    Active,
    Blocked,
    Removed,
}

impl ServerActivationState {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Created),
            2 => Some(Self::OtpUsed),
            3 => Some(Self::Active),
            4 => Some(Self::Blocked),
            5 => Some(Self::Removed),
            _ => None,
        }
    }
}

/// Decoded layout of the 24-byte status blob: version, state, 4-byte
/// big-endian counter, failed-attempts, max-failed-attempts, padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusBlob {
    pub version: u8,
    pub state: ServerActivationState,
    pub server_counter: u32,
    pub failed_attempts: u8,
    pub max_failed_attempts: u8,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StatusBlobError {
    #[error("status blob must be exactly 24 bytes, got {0}")]
    WrongLength(usize),
    #[error("unrecognized activation state byte: {0}")]
    UnknownState(u8),
}

impl StatusBlob {
    pub fn decode(blob: &[u8]) -> Result<Self, StatusBlobError> {
        if blob.len() != 24 {
            return Err(StatusBlobError::WrongLength(blob.len()));
        }
        let state = ServerActivationState::from_byte(blob[1])
            .ok_or(StatusBlobError::UnknownState(blob[1]))?;
        let server_counter = u32::from_be_bytes([blob[2], blob[3], blob[4], blob[5]]);
        Ok(StatusBlob {
            version: blob[0],
            state,
            server_counter,
            failed_attempts: blob[6],
            max_failed_attempts: blob[7],
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VaultUnlockResponse {
    pub encrypted_vault_encryption_key: String, // base64
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationRemoveResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_a_valid_status_blob() {
        let mut blob = [0u8; 24];
        blob[0] = 1; // version
        blob[1] = 3; // Active
        blob[2..6].copy_from_slice(&7u32.to_be_bytes());
        blob[6] = 1; // failed
        blob[7] = 5; // max failed

        let decoded = StatusBlob::decode(&blob).unwrap();
        assert_eq!(decoded.state, ServerActivationState::Active);
        assert_eq!(decoded.server_counter, 7);
        assert_eq!(decoded.failed_attempts, 1);
        assert_eq!(decoded.max_failed_attempts, 5);
    }

    #[test]
    fn rejects_wrong_length() {
        assert_eq!(
            StatusBlob::decode(&[0u8; 10]).unwrap_err(),
            StatusBlobError::WrongLength(10)
        );
    }

    #[test]
    fn rejects_unknown_state_byte() {
        let mut blob = [0u8; 24];
        blob[1] = 9;
        assert_eq!(
            StatusBlob::decode(&blob).unwrap_err(),
            StatusBlobError::UnknownState(9)
        );
    }
}
