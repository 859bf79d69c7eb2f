use argon2::Argon2;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config;

#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),
    #[error("encryption failed: {0}")]
    Encryption(String),
    #[error("decryption failed: {0}")]
    Decryption(String),
}

/// Cryptographically random 16-byte file id. Doubles as the KDF salt and
/// the nonce prefix, so it must be unique per encode run.
pub fn generate_file_id() -> [u8; config::FILE_ID_SIZE] {
    let mut id = [0u8; config::FILE_ID_SIZE];
    rand::thread_rng().fill_bytes(&mut id);
    id
}

/// Chunk encryption key derived from a password, zeroed when dropped.
pub struct SessionKey([u8; config::ARGON2_OUTPUT_LEN]);

impl SessionKey {
    /// Argon2id with the file id as salt, so the same password yields a
    /// different key for every encoded file.
    pub fn derive(
        password: &[u8],
        file_id: &[u8; config::FILE_ID_SIZE],
    ) -> Result<Self, CryptoError> {
        let params = argon2::Params::new(
            config::ARGON2_MEM_COST,
            config::ARGON2_TIME_COST,
            config::ARGON2_PARALLELISM,
            Some(config::ARGON2_OUTPUT_LEN),
        )
        .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        let argon2 = Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params);

        let mut key = [0u8; config::ARGON2_OUTPUT_LEN];
        argon2
            .hash_password_into(password, file_id, &mut key)
            .map_err(|e| CryptoError::KeyDerivation(e.to_string()))?;
        Ok(Self(key))
    }

    fn cipher(&self) -> XChaCha20Poly1305 {
        XChaCha20Poly1305::new(chacha20poly1305::Key::from_slice(&self.0))
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        secure_zero(&mut self.0);
    }
}

/// 24-byte nonce: file_id (16) || chunk_index LE (4) || zeros (4). Unique
/// per chunk because the file id is unique per run.
fn build_nonce(file_id: &[u8; config::FILE_ID_SIZE], chunk_index: u32) -> [u8; config::NONCE_SIZE] {
    let mut nonce = [0u8; config::NONCE_SIZE];
    nonce[..16].copy_from_slice(file_id);
    nonce[16..20].copy_from_slice(&chunk_index.to_le_bytes());
    nonce
}

/// Encrypt one chunk with XChaCha20-Poly1305. Output is ciphertext plus the
/// 16-byte tag; the plaintext length travels in the packet header instead of
/// a prefix here.
pub fn encrypt_chunk(
    key: &SessionKey,
    file_id: &[u8; config::FILE_ID_SIZE],
    chunk_index: u32,
    plaintext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let nonce_bytes = build_nonce(file_id, chunk_index);
    key.cipher()
        .encrypt(XNonce::from_slice(&nonce_bytes), plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

/// Decrypt one chunk. Fails on a wrong key or any ciphertext tampering.
pub fn decrypt_chunk(
    key: &SessionKey,
    file_id: &[u8; config::FILE_ID_SIZE],
    chunk_index: u32,
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < config::AEAD_TAG_SIZE {
        return Err(CryptoError::Decryption(format!(
            "ciphertext shorter than the {}-byte tag",
            config::AEAD_TAG_SIZE
        )));
    }
    let nonce_bytes = build_nonce(file_id, chunk_index);
    key.cipher()
        .decrypt(XNonce::from_slice(&nonce_bytes), ciphertext)
        .map_err(|e| CryptoError::Decryption(e.to_string()))
}

fn secure_zero(buf: &mut [u8]) {
    for byte in buf.iter_mut() {
        unsafe {
            std::ptr::write_volatile(byte, 0);
        }
    }
    std::sync::atomic::fence(std::sync::atomic::Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_ids_are_random() {
        assert_ne!(generate_file_id(), generate_file_id());
    }

    #[test]
    fn key_derivation_is_deterministic_per_password_and_salt() {
        let file_id = generate_file_id();
        let a = SessionKey::derive(b"password123", &file_id).unwrap();
        let b = SessionKey::derive(b"password123", &file_id).unwrap();
        let c = SessionKey::derive(b"different", &file_id).unwrap();

        let sealed = encrypt_chunk(&a, &file_id, 0, b"same key in, same key out").unwrap();
        assert_eq!(
            decrypt_chunk(&b, &file_id, 0, &sealed).unwrap(),
            b"same key in, same key out"
        );
        assert!(decrypt_chunk(&c, &file_id, 0, &sealed).is_err());
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let file_id = generate_file_id();
        let key = SessionKey::derive(b"test password", &file_id).unwrap();
        let plaintext = b"store me losslessly";

        let ciphertext = encrypt_chunk(&key, &file_id, 3, plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len() + config::AEAD_TAG_SIZE);
        assert_ne!(&ciphertext[..plaintext.len()], plaintext.as_slice());

        let decrypted = decrypt_chunk(&key, &file_id, 3, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn empty_plaintext_roundtrip() {
        let file_id = generate_file_id();
        let key = SessionKey::derive(b"pw", &file_id).unwrap();
        let ciphertext = encrypt_chunk(&key, &file_id, 0, b"").unwrap();
        assert_eq!(ciphertext.len(), config::AEAD_TAG_SIZE);
        assert!(decrypt_chunk(&key, &file_id, 0, &ciphertext).unwrap().is_empty());
    }

    #[test]
    fn tampered_ciphertext_is_rejected() {
        let file_id = generate_file_id();
        let key = SessionKey::derive(b"pw", &file_id).unwrap();
        let mut ciphertext = encrypt_chunk(&key, &file_id, 0, b"payload bytes").unwrap();
        ciphertext[2] ^= 0x01;
        assert!(decrypt_chunk(&key, &file_id, 0, &ciphertext).is_err());
    }

    #[test]
    fn chunk_index_changes_the_nonce() {
        let file_id = generate_file_id();
        let key = SessionKey::derive(b"pw", &file_id).unwrap();
        let enc0 = encrypt_chunk(&key, &file_id, 0, b"same data").unwrap();
        let enc1 = encrypt_chunk(&key, &file_id, 1, b"same data").unwrap();
        assert_ne!(enc0, enc1);

        // Decrypting under the wrong index must fail, not garble.
        assert!(decrypt_chunk(&key, &file_id, 1, &enc0).is_err());
    }
}
