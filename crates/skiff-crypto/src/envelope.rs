//! AES-256-GCM envelope with PBKDF2 key derivation.
//!
//! The wire form of a sealed payload is `salt(8) || nonce(12) || ciphertext+tag`.
//! The salt is fixed for the life of a session; a fresh nonce is drawn per
//! message from the OS random source.

use crate::error::CryptoError;
use crate::{NONCE_SIZE, SALT_SIZE};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroize;

/// PBKDF2 iteration count for envelope key derivation
pub const KEY_DERIVE_ROUNDS: u32 = 100;

/// Session envelope: derives one AES key from a shared secret and salt,
/// then seals and opens individual payloads.
pub struct Envelope {
    cipher: Aes256Gcm,
    salt: [u8; SALT_SIZE],
}

impl Envelope {
    /// Create an envelope from a shared secret and salt.
    ///
    /// An empty salt draws a fresh random 8-byte salt; any other length than
    /// exactly 8 bytes is rejected.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::BadSaltLength`] for a salt that is neither
    /// empty nor 8 bytes.
    pub fn new(secret: &[u8], salt: &[u8]) -> Result<Self, CryptoError> {
        let salt = match salt.len() {
            0 => {
                let mut fresh = [0u8; SALT_SIZE];
                OsRng.fill_bytes(&mut fresh);
                fresh
            }
            SALT_SIZE => {
                let mut fixed = [0u8; SALT_SIZE];
                fixed.copy_from_slice(salt);
                fixed
            }
            actual => {
                return Err(CryptoError::BadSaltLength {
                    expected: SALT_SIZE,
                    actual,
                });
            }
        };

        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha256>(secret, &salt, KEY_DERIVE_ROUNDS, &mut key);
        let cipher = Aes256Gcm::new((&key).into());
        key.zeroize();

        Ok(Self { cipher, salt })
    }

    /// The session salt carried in every sealed payload
    #[must_use]
    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    /// Seal a plaintext, returning `salt || nonce || ciphertext+tag`
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::EncryptionFailed`] if AES-GCM rejects the input.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + ciphertext.len());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Open a sealed payload produced by [`Envelope::encrypt`]
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::TruncatedEnvelope`] for payloads shorter than
    /// the fixed header, [`CryptoError::SaltMismatch`] if the embedded salt
    /// is not this session's, and [`CryptoError::AuthenticationFailed`] on
    /// tag mismatch.
    pub fn decrypt(&self, blob: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if blob.len() < SALT_SIZE + NONCE_SIZE {
            return Err(CryptoError::TruncatedEnvelope(blob.len()));
        }

        let (salt, rest) = blob.split_at(SALT_SIZE);
        if salt != self.salt {
            return Err(CryptoError::SaltMismatch);
        }

        let (nonce, ciphertext) = rest.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CryptoError::AuthenticationFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let env = Envelope::new(b"session key material", b"").unwrap();
        let plaintext = b"hello, world";

        let sealed = env.encrypt(plaintext).unwrap();
        let opened = env.decrypt(&sealed).unwrap();

        assert_eq!(opened, plaintext);
    }

    #[test]
    fn test_envelope_fresh_nonce_per_message() {
        let env = Envelope::new(b"key", b"saltsalt").unwrap();

        let a = env.encrypt(b"same plaintext").unwrap();
        let b = env.encrypt(b"same plaintext").unwrap();

        assert_ne!(a, b);
        // Same salt prefix, different nonce and ciphertext.
        assert_eq!(a[..SALT_SIZE], b[..SALT_SIZE]);
        assert_ne!(a[SALT_SIZE..SALT_SIZE + NONCE_SIZE], b[SALT_SIZE..SALT_SIZE + NONCE_SIZE]);
    }

    #[test]
    fn test_envelope_tamper_detection() {
        let env = Envelope::new(b"key", b"saltsalt").unwrap();

        let mut sealed = env.encrypt(b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0xFF;

        assert!(matches!(
            env.decrypt(&sealed),
            Err(CryptoError::AuthenticationFailed)
        ));
    }

    #[test]
    fn test_envelope_wrong_key_fails() {
        let env = Envelope::new(b"key one", b"saltsalt").unwrap();
        let other = Envelope::new(b"key two", b"saltsalt").unwrap();

        let sealed = env.encrypt(b"payload").unwrap();
        assert!(other.decrypt(&sealed).is_err());
    }

    #[test]
    fn test_envelope_salt_mismatch() {
        let env = Envelope::new(b"key", b"saltsalt").unwrap();
        let other = Envelope::new(b"key", b"tlastlas").unwrap();

        let sealed = other.encrypt(b"payload").unwrap();
        assert!(matches!(
            env.decrypt(&sealed),
            Err(CryptoError::SaltMismatch)
        ));
    }

    #[test]
    fn test_envelope_truncated() {
        let env = Envelope::new(b"key", b"saltsalt").unwrap();
        assert!(matches!(
            env.decrypt(&[0u8; 10]),
            Err(CryptoError::TruncatedEnvelope(10))
        ));
    }

    #[test]
    fn test_envelope_rejects_odd_salt_length() {
        assert!(matches!(
            Envelope::new(b"key", b"short"),
            Err(CryptoError::BadSaltLength {
                expected: SALT_SIZE,
                actual: 5
            })
        ));
    }

    #[test]
    fn test_envelope_random_salt_drawn_when_empty() {
        let a = Envelope::new(b"key", b"").unwrap();
        let b = Envelope::new(b"key", b"").unwrap();
        assert_ne!(a.salt(), b.salt());
    }
}
