//! Activation-code grammar and checksum (§6):
//!
//! `XXXXX-XXXXX-XXXXX-XXXXX`, four groups of five RFC4648 base32 symbols
//! (alphabet `A-Z2-7`, no padding). The first two groups decode to
//! `activation_id_short`; the last two groups are `activation_otp`, whose
//! final character also serves as a Luhn-style checksum over the first 19
//! characters. A code built entirely of the zero symbol never validates,
//! since the checksum carries a nonzero offset.
//!
//! QR-code payloads carry this same grammar as their first field; parsing
//! beyond that field is out of scope here.

use crate::error::ActivationCodeError;

const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
const GROUP_LEN: usize = 5;
const NUM_GROUPS: usize = 4;
const TOTAL_CHARS: usize = GROUP_LEN * NUM_GROUPS;

/// A parsed, checksum-validated activation code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationCode {
    pub activation_id_short: String,
    pub activation_otp: String,
}

fn symbol_value(c: char) -> Result<u8, ActivationCodeError> {
    let upper = c.to_ascii_uppercase();
    ALPHABET
        .iter()
        .position(|&b| b as char == upper)
        .map(|p| p as u8)
        .ok_or(ActivationCodeError::InvalidAlphabet(c))
}

fn value_symbol(v: u8) -> char {
    ALPHABET[v as usize] as char
}

/// Luhn-mod-32 weighted sum: doubling every second digit counting from the
/// one immediately left of the check digit, reducing doubled values that
/// overflow the alphabet size.
fn luhn_mod32_sum(values: &[u8]) -> u32 {
    let len = values.len();
    let mut sum = 0u32;
    for (i, &v) in values.iter().enumerate() {
        let position_from_right = len - i; // 1-indexed, 1 = adjacent to check digit
        let mut val = v as u32;
        if position_from_right % 2 == 1 {
            val *= 2;
            if val >= 32 {
                val -= 31;
            }
        }
        sum += val;
    }
    sum
}

/// Additive offset so an all-zero payload does not validate with an
/// all-zero check digit.
const CHECKSUM_OFFSET: u32 = 4;

fn checksum_value(payload: &[u8]) -> u8 {
    ((luhn_mod32_sum(payload) + CHECKSUM_OFFSET) % 32) as u8
}

impl ActivationCode {
    /// Parse and checksum-validate a code in `XXXXX-XXXXX-XXXXX-XXXXX` form.
    pub fn parse(code: &str) -> Result<Self, ActivationCodeError> {
        let groups: Vec<&str> = code.split('-').collect();
        if groups.len() != NUM_GROUPS || groups.iter().any(|g| g.len() != GROUP_LEN) {
            return Err(ActivationCodeError::MalformedGrammar);
        }

        let chars: Vec<char> = groups.concat().chars().collect();
        debug_assert_eq!(chars.len(), TOTAL_CHARS);

        let mut values = Vec::with_capacity(TOTAL_CHARS);
        for c in &chars {
            values.push(symbol_value(*c)?);
        }

        let payload = &values[..TOTAL_CHARS - 1];
        let expected = checksum_value(payload);
        let actual = values[TOTAL_CHARS - 1];
        if expected != actual {
            return Err(ActivationCodeError::ChecksumMismatch);
        }

        let activation_id_short: String = chars[..2 * GROUP_LEN].iter().collect();
        let activation_otp: String = chars[2 * GROUP_LEN..].iter().collect();

        Ok(ActivationCode {
            activation_id_short,
            activation_otp,
        })
    }

    /// Build and checksum a code from a 10-character `activation_id_short`
    /// and a 9-character `activation_otp` prefix (the checksum forms the
    /// tenth and final character).
    pub fn encode(
        activation_id_short: &str,
        activation_otp_prefix: &str,
    ) -> Result<String, ActivationCodeError> {
        if activation_id_short.chars().count() != 2 * GROUP_LEN
            || activation_otp_prefix.chars().count() != 2 * GROUP_LEN - 1
        {
            return Err(ActivationCodeError::MalformedGrammar);
        }
        let mut values = Vec::with_capacity(TOTAL_CHARS - 1);
        for c in activation_id_short.chars().chain(activation_otp_prefix.chars()) {
            values.push(symbol_value(c)?);
        }
        let check = checksum_value(&values);
        let full: String = activation_id_short
            .chars()
            .chain(activation_otp_prefix.chars())
            .chain(std::iter::once(value_symbol(check)))
            .collect();

        let mut out = String::with_capacity(TOTAL_CHARS + NUM_GROUPS - 1);
        for (i, c) in full.chars().enumerate() {
            if i > 0 && i % GROUP_LEN == 0 {
                out.push('-');
            }
            out.push(c);
        }
        Ok(out)
    }
}
