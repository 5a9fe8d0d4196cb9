//! `prepareKeyValueDictionaryForDataSigning` — canonicalize a string→string
//! map into the bytes signed for GET-request bodies (§4.A).
//!
//! Lexicographic key order, RFC3986 percent-encoding of both key and
//! value, joined as `k=v&k=v`. An empty map yields empty bytes.

use std::collections::BTreeMap;

/// RFC3986 unreserved characters: ALPHA / DIGIT / "-" / "." / "_" / "~".
fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn percent_encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.as_bytes() {
        if is_unreserved(*b) {
            out.push(*b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Canonicalize a query parameter map for data signing. Keys are sorted
/// lexicographically before encoding so the result is independent of
/// caller-supplied ordering.
pub fn canonicalize_query_map(params: &BTreeMap<String, String>) -> Vec<u8> {
    if params.is_empty() {
        return Vec::new();
    }
    let encoded: Vec<String> = params
        .iter()
        .map(|(k, v)| format!("{}={}", percent_encode(k), percent_encode(v)))
        .collect();
    encoded.join("&").into_bytes()
}
