//! The `X-PowerAuth-Authorization` header (§4.D step 5).

use crate::factor::FactorCombination;

pub const HEADER_NAME: &str = "X-PowerAuth-Authorization";
pub const PROTOCOL_VERSION: &str = "2.1";

/// Fields needed to render the authorization header for one signed
/// request.
pub struct SignatureHeaderFields<'a> {
    pub activation_id: &'a str,
    pub application_key: &'a str,
    pub nonce_b64: &'a str,
    pub factors: FactorCombination,
    /// Dash-joined 8-digit MAC groups, e.g. `"12345678-23456789"`.
    pub signature: &'a str,
}

/// Render `PowerAuth pa_activation_id="…", pa_application_key="…",
/// pa_nonce="…", pa_signature_type="…", pa_signature="…", pa_version="2.1"`.
pub fn format_header(fields: &SignatureHeaderFields<'_>) -> String {
    format!(
        concat!(
            "PowerAuth pa_activation_id=\"{}\", pa_application_key=\"{}\", ",
            "pa_nonce=\"{}\", pa_signature_type=\"{}\", pa_signature=\"{}\", ",
            "pa_version=\"{}\""
        ),
        fields.activation_id,
        fields.application_key,
        fields.nonce_b64,
        fields.factors.signature_type(),
        fields.signature,
        PROTOCOL_VERSION,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_the_expected_header_shape() {
        let fields = SignatureHeaderFields {
            activation_id: "act-1",
            application_key: "app-key",
            nonce_b64: "bm9uY2U=",
            factors: FactorCombination::PossessionKnowledge,
            signature: "12345678-23456789",
        };
        let header = format_header(&fields);
        assert_eq!(
            header,
            "PowerAuth pa_activation_id=\"act-1\", pa_application_key=\"app-key\", \
pa_nonce=\"bm9uY2U=\", pa_signature_type=\"possession_knowledge\", \
pa_signature=\"12345678-23456789\", pa_version=\"2.1\""
        );
    }
}
