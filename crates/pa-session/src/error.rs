//! Error taxonomy (§7). Variants are kinds, not opaque strings, so callers
//! can branch on them; each carries enough context to log without ever
//! carrying key material.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PowerAuthError {
    #[error("session has no valid setup")]
    NotConfigured,

    #[error("operation requires state {expected}, session is in state {actual}")]
    InvalidActivationState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("no activation present; operation requires an active session")]
    MissingActivation,

    #[error("activation is pending; local state is all that is available")]
    ActivationPending,

    #[error("invalid activation code: {0}")]
    InvalidActivationCode(#[from] pa_proto::ActivationCodeError),

    #[error("invalid activation data: {0}")]
    InvalidActivationData(String),

    #[error("internal inconsistency while producing a signature: {0}")]
    SignatureError(String),

    #[error("non-personalized encryption envelope failed: {0}")]
    EncryptionFailed(String),

    #[error("transport error: {0}")]
    Network(String),

    #[error("biometric prompt was cancelled")]
    BiometryCancelled,

    /// Not one of §7's named kinds — an addition for the possession-is-
    /// mandatory-at-commit invariant (see the commit design decision).
    #[error("commit requires a possession unlock key")]
    PossessionFactorRequired,
}

impl PowerAuthError {
    pub fn invalid_state(expected: &'static str, actual: &'static str) -> Self {
        PowerAuthError::InvalidActivationState { expected, actual }
    }
}

impl From<pa_crypto::CryptoError> for PowerAuthError {
    fn from(e: pa_crypto::CryptoError) -> Self {
        PowerAuthError::InvalidActivationData(e.to_string())
    }
}
