//! At-rest credential codec
//!
//! Obfuscates saved credentials with a SHA-256 counter keystream XOR,
//! base64-encoded under a `v1:` version prefix. This is reversible
//! obfuscation keyed by an app-level secret, not key-managed encryption;
//! it keeps plaintext out of config files and survives format evolution
//! through the prefix.
//!
//! Decoding is lenient: values without the prefix (or that fail to
//! decode) are returned unchanged, so configs written before encryption
//! was introduced keep working.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

const PREFIX: &str = "v1:";
const DEFAULT_KEY: &str = "shipyard-at-rest-v1";

#[derive(Debug, Clone)]
pub struct CredentialCodec {
    key: String,
}

impl CredentialCodec {
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// Keystream blocks: sha256(key || block counter)
    fn keystream(&self, len: usize) -> Vec<u8> {
        let mut stream = Vec::with_capacity(len + 32);
        let mut counter: u64 = 0;
        while stream.len() < len {
            let mut hasher = Sha256::new();
            hasher.update(self.key.as_bytes());
            hasher.update(counter.to_le_bytes());
            stream.extend_from_slice(&hasher.finalize());
            counter += 1;
        }
        stream.truncate(len);
        stream
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        let bytes = plaintext.as_bytes();
        let stream = self.keystream(bytes.len());
        let mixed: Vec<u8> = bytes.iter().zip(&stream).map(|(b, k)| b ^ k).collect();
        format!("{}{}", PREFIX, BASE64.encode(mixed))
    }

    pub fn decrypt(&self, value: &str) -> String {
        let Some(encoded) = value.strip_prefix(PREFIX) else {
            // Legacy plaintext value
            return value.to_string();
        };
        let Ok(mixed) = BASE64.decode(encoded) else {
            return value.to_string();
        };
        let stream = self.keystream(mixed.len());
        let bytes: Vec<u8> = mixed.iter().zip(&stream).map(|(b, k)| b ^ k).collect();
        match String::from_utf8(bytes) {
            Ok(plaintext) => plaintext,
            Err(_) => value.to_string(),
        }
    }

    /// Whether a stored value carries the encryption prefix
    pub fn is_encrypted(value: &str) -> bool {
        value.starts_with(PREFIX)
    }
}

impl Default for CredentialCodec {
    fn default() -> Self {
        Self::new(DEFAULT_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let codec = CredentialCodec::default();
        let secret = "tok_4f6a!亜 spaces and unicode";
        let stored = codec.encrypt(secret);
        assert!(stored.starts_with("v1:"));
        assert_ne!(stored, secret);
        assert_eq!(codec.decrypt(&stored), secret);
    }

    #[test]
    fn test_plaintext_passthrough() {
        let codec = CredentialCodec::default();
        assert_eq!(codec.decrypt("legacy-plain-token"), "legacy-plain-token");
    }

    #[test]
    fn test_bad_base64_passthrough() {
        let codec = CredentialCodec::default();
        assert_eq!(codec.decrypt("v1:!!!not-base64!!!"), "v1:!!!not-base64!!!");
    }

    #[test]
    fn test_keys_differ() {
        let a = CredentialCodec::new("key-a");
        let b = CredentialCodec::new("key-b");
        let stored = a.encrypt("secret");
        assert_ne!(b.decrypt(&stored), "secret");
    }

    #[test]
    fn test_long_value_crosses_block_boundary() {
        let codec = CredentialCodec::default();
        let secret = "x".repeat(100);
        assert_eq!(codec.decrypt(&codec.encrypt(&secret)), secret);
    }
}
