//! Index crypto
//!
//! Two primitives, both keyed by the database key: deterministic index-key
//! derivation (HMAC-SHA256, base64-encoded) for token rows and instance-id
//! keys, and AES-256-GCM for posting payloads with the nonce prepended to
//! the ciphertext. Nothing leaves memory for the object store without
//! passing through one of them.

use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Nonce size for AES-GCM (96 bits / 12 bytes)
const NONCE_SIZE: usize = 12;

pub struct IndexCrypto {
    cipher: Aes256Gcm,
    mac: HmacSha256,
}

impl IndexCrypto {
    pub fn new(db_key: [u8; 32]) -> Result<Self> {
        let mac = <HmacSha256 as Mac>::new_from_slice(&db_key)
            .map_err(|e| Error::Crypto(format!("invalid database key: {}", e)))?;
        Ok(Self {
            cipher: Aes256Gcm::new(&db_key.into()),
            mac,
        })
    }

    /// Deterministic store key for a token or instance id.
    pub fn index_key_b64(&self, plain: &[u8]) -> String {
        let mut mac = self.mac.clone();
        mac.update(plain);
        BASE64.encode(mac.finalize().into_bytes())
    }

    /// Encrypt a posting payload; the random nonce is prepended.
    pub fn encrypt(&self, plain: &[u8]) -> Result<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plain)
            .map_err(|e| Error::Crypto(format!("encryption failed: {}", e)))?;
        let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>> {
        if data.len() < NONCE_SIZE {
            return Err(Error::Crypto("ciphertext too short".to_string()));
        }
        let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|e| Error::Crypto(format!("decryption failed: {}", e)))
    }
}
