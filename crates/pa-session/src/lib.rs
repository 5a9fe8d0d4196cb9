//! pa-session — PowerAuth client core: activation state machine, HTTP
//! signature engine, vault-unlock, and the `PowerAuthSdk` facade.
//!
//! # Module layout
//! - `config`      — `SessionSetup`, the validated per-application config
//! - `error`       — unified error taxonomy
//! - `state`       — `Session`, `ActivationState` and its variants
//! - `serialize`   — versioned binary (de)serialization of `ActivationState`
//! - `activation`  — the three-step activation handshake
//! - `signature`   — HTTP request signing
//! - `vault_unlock` — vault-gated operations built on a one-shot `K_vault`
//! - `persistence` — the `PersistenceAdapter` trait and two implementations
//! - `transport`   — the `PowerAuthTransport` trait (network I/O boundary)
//! - `sdk`         — `PowerAuthSdk`, the locking facade tying it all together

pub mod activation;
pub mod config;
pub mod error;
pub mod persistence;
pub mod sdk;
pub mod serialize;
pub mod signature;
pub mod state;
pub mod transport;
pub mod vault_unlock;

pub use config::SessionSetup;
pub use error::PowerAuthError;
pub use persistence::{InMemoryPersistence, KeyringPersistence, PersistenceAdapter};
pub use sdk::PowerAuthSdk;
pub use signature::{RequestBody, SignedRequest};
pub use state::{ActivationState, Session};
pub use transport::PowerAuthTransport;
