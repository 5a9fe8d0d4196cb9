//! `SessionSetup` (§3) — the immutable, validated configuration a `Session`
//! is built from. No singleton, no environment lookup; the "panic-free
//! surface" redesign note (§9) is satisfied by making an invalid setup
//! unrepresentable rather than checked later.

use p256::PublicKey;

use crate::error::PowerAuthError;

/// Application-scoped configuration, shared by every `Session` for one
/// application/server pair. `external_encryption_key`, when present, is an
/// extra wrapping layer applied by the caller outside this crate; the core
/// only threads it through opaquely.
#[derive(Debug)]
pub struct SessionSetup {
    pub application_key: String,
    pub application_secret: Vec<u8>,
    pub server_master_public_key: PublicKey,
    pub external_encryption_key: Option<Vec<u8>>,
    pub instance_id: String,
}

impl SessionSetup {
    /// Validates non-emptiness of identifiers and secrets. A `Session`
    /// constructed from a `SessionSetup` can therefore never observe
    /// `!has_valid_setup()`.
    pub fn new(
        application_key: impl Into<String>,
        application_secret: impl Into<Vec<u8>>,
        server_master_public_key: PublicKey,
        instance_id: impl Into<String>,
    ) -> Result<Self, PowerAuthError> {
        let application_key = application_key.into();
        let application_secret = application_secret.into();
        let instance_id = instance_id.into();

        if application_key.is_empty() || application_secret.is_empty() || instance_id.is_empty() {
            return Err(PowerAuthError::NotConfigured);
        }

        Ok(Self {
            application_key,
            application_secret,
            server_master_public_key,
            external_encryption_key: None,
            instance_id,
        })
    }

    pub fn with_external_encryption_key(mut self, key: Vec<u8>) -> Self {
        self.external_encryption_key = Some(key);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use p256::SecretKey;
    use rand_core::OsRng;

    fn server_key() -> PublicKey {
        SecretKey::random(&mut OsRng).public_key()
    }

    #[test]
    fn rejects_empty_application_key() {
        let err = SessionSetup::new("", b"secret".to_vec(), server_key(), "instance-1").unwrap_err();
        assert!(matches!(err, PowerAuthError::NotConfigured));
    }

    #[test]
    fn accepts_well_formed_setup() {
        let setup = SessionSetup::new("app-key", b"secret".to_vec(), server_key(), "instance-1");
        assert!(setup.is_ok());
    }
}
