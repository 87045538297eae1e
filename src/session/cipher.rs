//! Private-mode obfuscation cipher: a bytewise XOR with the ASCII bytes
//! of the shared key, cycled, transmitted as a lowercase hex string.
//! Explicitly weak — an acoustic-band deterrent, not real cryptography.

use rand::RngCore;

use crate::error::SessionError;

/// Generates a fresh shared key for entering private mode. Hex-encoded
/// so the resulting ASCII bytes are safe to cycle the XOR obfuscation
/// against.
pub fn generate_key() -> String {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    to_hex(&bytes)
}

fn xor_cycle(data: &[u8], key: &[u8]) -> Vec<u8> {
    if key.is_empty() {
        return data.to_vec();
    }
    data.iter()
        .enumerate()
        .map(|(i, &b)| b ^ key[i % key.len()])
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn from_hex(s: &str) -> Result<Vec<u8>, SessionError> {
    if s.len() % 2 != 0 {
        return Err(SessionError::DecryptFailed);
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|_| SessionError::DecryptFailed))
        .collect()
}

pub fn encrypt_content(plaintext: &str, key: &str) -> String {
    to_hex(&xor_cycle(plaintext.as_bytes(), key.as_bytes()))
}

/// Decrypts the hex-encoded ciphertext. A key that yields invalid UTF-8
/// (or malformed hex) is a decrypt-failed condition, surfaced by the
/// caller as a placeholder message rather than dropped.
pub fn decrypt_content(ciphertext_hex: &str, key: &str) -> Result<String, SessionError> {
    let bytes = from_hex(ciphertext_hex)?;
    let plain = xor_cycle(&bytes, key.as_bytes());
    String::from_utf8(plain).map_err(|_| SessionError::DecryptFailed)
}
