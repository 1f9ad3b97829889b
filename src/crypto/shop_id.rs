//! Shop id encryption for callback URLs
//!
//! The shop id handed to [`ShopIdCodec::encrypt`] is sealed with AES-256-GCM
//! under a key derived from the configured encryption secret, and encoded as
//! unpadded URL-safe base64 so it can travel as a query parameter:
//!
//! ```text
//! token = base64url( nonce(12) || ciphertext || tag(16) )
//! ```
//!
//! Decryption only succeeds with the same secret that produced the token.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// Nonce size for AES-GCM (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("encryption key must not be empty")]
    EmptyKey,

    #[error("shop id token is not valid base64url: {0}")]
    InvalidEncoding(#[from] base64::DecodeError),

    #[error("shop id token is too short")]
    InvalidLength,

    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("shop id could not be decrypted")]
    DecryptionFailed,

    #[error("decrypted shop id is not valid UTF-8")]
    InvalidUtf8,
}

/// Symmetric codec for the shop id embedded in notification URLs
#[derive(Clone)]
pub struct ShopIdCodec {
    key: [u8; 32],
}

impl ShopIdCodec {
    /// Derive the AES-256 key from the configured secret
    pub fn new(secret: &str) -> Result<Self, CodecError> {
        if secret.is_empty() {
            return Err(CodecError::EmptyKey);
        }

        let digest = Sha256::digest(secret.as_bytes());
        let mut key = [0u8; 32];
        key.copy_from_slice(&digest);
        Ok(Self { key })
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key))
    }

    pub fn encrypt(&self, shop_id: &str) -> Result<String, CodecError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher()
            .encrypt(Nonce::from_slice(&nonce_bytes), shop_id.as_bytes())
            .map_err(|e| CodecError::EncryptionFailed(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);

        Ok(URL_SAFE_NO_PAD.encode(sealed))
    }

    pub fn decrypt(&self, token: &str) -> Result<String, CodecError> {
        let trimmed = token.trim().trim_end_matches('=');
        let sealed = URL_SAFE_NO_PAD.decode(trimmed)?;
        if sealed.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CodecError::InvalidLength);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher()
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CodecError::DecryptionFailed)?;

        String::from_utf8(plaintext).map_err(|_| CodecError::InvalidUtf8)
    }
}

impl std::fmt::Debug for ShopIdCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopIdCodec").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_returns_original_id() {
        let codec = ShopIdCodec::new("s3cr3t-encryption-key").unwrap();
        for id in ["1", "42", "order-2024-00017", "Bestellung Nr. 5 äöü", ""] {
            let token = codec.encrypt(id).unwrap();
            assert_eq!(codec.decrypt(&token).unwrap(), id);
        }
    }

    #[test]
    fn test_token_is_url_safe() {
        let codec = ShopIdCodec::new("key").unwrap();
        let token = codec.encrypt("order-with-a-long-identifier-0000000001").unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_tokens_are_randomized() {
        let codec = ShopIdCodec::new("key").unwrap();
        assert_ne!(codec.encrypt("7").unwrap(), codec.encrypt("7").unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let token = ShopIdCodec::new("key-a").unwrap().encrypt("7").unwrap();
        let result = ShopIdCodec::new("key-b").unwrap().decrypt(&token);
        assert!(matches!(result, Err(CodecError::DecryptionFailed)));
    }

    #[test]
    fn test_tampered_token_fails() {
        let codec = ShopIdCodec::new("key").unwrap();
        let token = codec.encrypt("7").unwrap();
        let mut bytes = URL_SAFE_NO_PAD.decode(&token).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(bytes);
        assert!(codec.decrypt(&tampered).is_err());
    }

    #[test]
    fn test_garbage_input() {
        let codec = ShopIdCodec::new("key").unwrap();
        assert!(matches!(codec.decrypt("not base64!"), Err(CodecError::InvalidEncoding(_))));
        assert!(matches!(codec.decrypt("AAAA"), Err(CodecError::InvalidLength)));
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(matches!(ShopIdCodec::new(""), Err(CodecError::EmptyKey)));
    }
}
