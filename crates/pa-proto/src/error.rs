use thiserror::Error;

/// Parse-time failures for the activation-code grammar (§6). These map to
/// `PowerAuthError::InvalidActivationCode` at the session layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ActivationCodeError {
    #[error("activation code does not match the XXXXX-XXXXX-XXXXX-XXXXX grammar")]
    MalformedGrammar,

    #[error("activation code contains a character outside the base32 alphabet: '{0}'")]
    InvalidAlphabet(char),

    #[error("activation code checksum mismatch")]
    ChecksumMismatch,
}
