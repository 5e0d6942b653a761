use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::Aes128Gcm;
use base64::engine::general_purpose::STANDARD as b64;
use base64::Engine;
use rand::{rngs::OsRng, Rng};
use zeroize::Zeroizing;

use crate::secrets::SecretError;

pub const ENCRYPTED_PREFIX: &str = "enc:";
pub const SECRET_KEY_SIZE: usize = 16;

const NONCE_SIZE: usize = 12;

/// Wraps credential values at rest as `enc:` + base64(nonce || ciphertext).
#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes128Gcm,
}

impl SecretCipher {
    pub fn new(key: &[u8]) -> Result<Self, SecretError> {
        if key.len() != SECRET_KEY_SIZE {
            return Err(SecretError::Cipher(format!(
                "Key must be {SECRET_KEY_SIZE} bytes, got {}",
                key.len()
            )));
        }

        let cipher = Aes128Gcm::new_from_slice(key)
            .map_err(|_| SecretError::Cipher(String::from("Invalid key")))?;

        Ok(Self { cipher })
    }

    pub fn seal(&self, plaintext: &str) -> Result<String, SecretError> {
        let nonce: [u8; NONCE_SIZE] = OsRng.gen();

        let ciphertext = self
            .cipher
            .encrypt((&nonce).into(), plaintext.as_bytes())
            .map_err(|_| SecretError::Cipher(String::from("Encryption failed")))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);

        Ok(format!("{ENCRYPTED_PREFIX}{}", b64.encode(combined)))
    }

    /// Strict decryption of a value produced by `seal`.
    pub fn open(&self, stored: &str) -> Result<Zeroizing<String>, SecretError> {
        let encoded = stored
            .strip_prefix(ENCRYPTED_PREFIX)
            .ok_or_else(|| SecretError::Cipher(String::from("Missing encryption marker")))?;

        let combined = b64
            .decode(encoded.as_bytes())
            .map_err(|_| SecretError::Cipher(String::from("Invalid base64")))?;

        if combined.len() <= NONCE_SIZE {
            return Err(SecretError::Cipher(String::from("Ciphertext too short")));
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);
        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(nonce.into(), ciphertext)
                .map_err(|_| SecretError::Cipher(String::from("Decryption failed")))?,
        );

        let plaintext = std::str::from_utf8(&plaintext)
            .map_err(|_| SecretError::Cipher(String::from("Plaintext is not UTF-8")))?;

        Ok(Zeroizing::new(String::from(plaintext)))
    }

    /// Reads a stored column that may predate encryption. An `enc:` value that does not
    /// decrypt is taken as plaintext with the marker stripped, and an unmarked value is
    /// returned as is.
    pub fn open_stored(&self, stored: &str) -> Zeroizing<String> {
        match stored.strip_prefix(ENCRYPTED_PREFIX) {
            Some(rest) => match self.open(stored) {
                Ok(plaintext) => plaintext,
                Err(_) => {
                    log::warn!("Stored credential carries the encryption marker but did not decrypt; treating it as plaintext");
                    Zeroizing::new(String::from(rest))
                }
            },
            None => Zeroizing::new(String::from(stored)),
        }
    }
}
