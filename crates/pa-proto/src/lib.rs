//! Wire types for the PowerAuth client core: the activation-code grammar,
//! factor bitmask, unlock-key carriers, REST DTOs, and the HTTP signature
//! header. No network I/O or state lives here — see `pa-session`.

pub mod activation_code;
pub mod auth;
pub mod error;
pub mod factor;
pub mod header;
pub mod wire;

pub use activation_code::ActivationCode;
pub use auth::{PowerAuthAuthentication, SignatureUnlockKeys};
pub use error::ActivationCodeError;
pub use factor::FactorCombination;
