//! Persistence adapter (§4.F): opaque key->bytes store for the serialized
//! session blob and the biometry blob. The core is agnostic to where bytes
//! actually live; the default implementation writes into the platform
//! keychain via `keyring`, same as the teacher's `secure_storage` module.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine;
use keyring::Entry;
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::error::PowerAuthError;

const SERVICE_NAME: &str = "PowerAuthSession";

#[async_trait]
pub trait PersistenceAdapter: Send + Sync {
    async fn save(&self, instance_id: &str, bytes: &[u8]) -> Result<(), PowerAuthError>;
    async fn load(&self, instance_id: &str) -> Result<Option<Vec<u8>>, PowerAuthError>;
    async fn remove(&self, instance_id: &str) -> Result<(), PowerAuthError>;
}

/// In-process store, mainly for tests and for hosts that manage their own
/// durable storage above this crate.
#[derive(Default)]
pub struct InMemoryPersistence {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceAdapter for InMemoryPersistence {
    async fn save(&self, instance_id: &str, bytes: &[u8]) -> Result<(), PowerAuthError> {
        self.entries
            .write()
            .insert(instance_id.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn load(&self, instance_id: &str) -> Result<Option<Vec<u8>>, PowerAuthError> {
        Ok(self.entries.read().get(instance_id).cloned())
    }

    async fn remove(&self, instance_id: &str) -> Result<(), PowerAuthError> {
        self.entries.write().remove(instance_id);
        Ok(())
    }
}

/// Default implementation: one keychain entry per instance id, storing the
/// serialized blob base64-encoded (`keyring` only stores UTF-8 strings).
pub struct KeyringPersistence;

impl KeyringPersistence {
    fn entry(&self, instance_id: &str) -> Result<Entry, PowerAuthError> {
        Entry::new(SERVICE_NAME, instance_id)
            .map_err(|e| PowerAuthError::Network(format!("keyring init: {e}")))
    }
}

#[async_trait]
impl PersistenceAdapter for KeyringPersistence {
    async fn save(&self, instance_id: &str, bytes: &[u8]) -> Result<(), PowerAuthError> {
        let entry = self.entry(instance_id)?;
        let encoded = B64.encode(bytes);
        entry
            .set_password(&encoded)
            .map_err(|e| PowerAuthError::Network(format!("keyring save: {e}")))
    }

    async fn load(&self, instance_id: &str) -> Result<Option<Vec<u8>>, PowerAuthError> {
        let entry = self.entry(instance_id)?;
        match entry.get_password() {
            Ok(encoded) => {
                let bytes = B64
                    .decode(encoded)
                    .map_err(|e| PowerAuthError::InvalidActivationData(e.to_string()))?;
                Ok(Some(bytes))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(PowerAuthError::Network(format!("keyring load: {e}"))),
        }
    }

    async fn remove(&self, instance_id: &str) -> Result<(), PowerAuthError> {
        let entry = self.entry(instance_id)?;
        match entry.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(PowerAuthError::Network(format!("keyring remove: {e}"))),
        }
    }
}
