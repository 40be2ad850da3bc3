//! Payload transforms: compression, encryption, and integrity digests

use crate::{Error, Result};
use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce,
};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use zeroize::Zeroizing;

/// Context string for key derivation. Changing it would orphan every
/// previously written encrypted backup.
const KEY_CONTEXT: &str = "crmvault 2024 backup payload encryption";

/// Nonce length of ChaCha20-Poly1305, in bytes
const NONCE_LEN: usize = 12;

/// Compress data with gzip
pub fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Decompress gzip data
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Hex SHA-256 digest
pub fn checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Derive the cipher key from the configured secret. The key lives in a
/// zeroizing buffer and is wiped when dropped.
fn derive_key(secret: &str) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(blake3::derive_key(KEY_CONTEXT, secret.as_bytes()))
}

/// Encrypt data, producing the stored `<hex-nonce>:<hex-ciphertext>` framing
pub fn encrypt(plaintext: &[u8], secret: &str) -> Result<Vec<u8>> {
    let key = derive_key(secret);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|_| Error::Encryption {
            reason: "payload encryption failed".to_string(),
        })?;

    let framed = format!("{}:{}", hex::encode(nonce), hex::encode(ciphertext));
    Ok(framed.into_bytes())
}

/// Decrypt a `<hex-nonce>:<hex-ciphertext>` payload
pub fn decrypt(payload: &[u8], secret: &str) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(payload).map_err(|_| Error::Encryption {
        reason: "encrypted payload is not valid UTF-8 framing".to_string(),
    })?;

    let (nonce_hex, ciphertext_hex) = text.split_once(':').ok_or_else(|| Error::Encryption {
        reason: "encrypted payload is missing the nonce separator".to_string(),
    })?;

    let nonce_bytes = hex::decode(nonce_hex).map_err(|_| Error::Encryption {
        reason: "encrypted payload has a malformed nonce".to_string(),
    })?;
    if nonce_bytes.len() != NONCE_LEN {
        return Err(Error::Encryption {
            reason: format!(
                "nonce must be {} bytes, found {}",
                NONCE_LEN,
                nonce_bytes.len()
            ),
        });
    }

    let ciphertext = hex::decode(ciphertext_hex).map_err(|_| Error::Encryption {
        reason: "encrypted payload has malformed ciphertext".to_string(),
    })?;

    let key = derive_key(secret);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_slice()));

    cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_ref())
        .map_err(|_| Error::Encryption {
            reason: "payload decryption failed (wrong key or corrupted data)".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compression_roundtrip() {
        let data = "the same row repeated ".repeat(200);
        let compressed = compress(data.as_bytes()).unwrap();
        assert!(compressed.len() < data.len());

        let restored = decompress(&compressed).unwrap();
        assert_eq!(restored, data.as_bytes());
    }

    #[test]
    fn test_checksum_is_stable_and_sensitive() {
        let a = checksum(b"payload");
        let b = checksum(b"payload");
        let c = checksum(b"payloae");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn test_encryption_roundtrip() {
        let plaintext = b"{\"data\":{\"clients\":[]}}";
        let encrypted = encrypt(plaintext, "secret").unwrap();
        let decrypted = decrypt(&encrypted, "secret").unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_encrypted_framing_shape() {
        let encrypted = encrypt(b"rows", "secret").unwrap();
        let text = std::str::from_utf8(&encrypted).unwrap();

        let (nonce_hex, ciphertext_hex) = text.split_once(':').unwrap();
        assert_eq!(nonce_hex.len(), NONCE_LEN * 2);
        assert!(nonce_hex.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(!ciphertext_hex.is_empty());
        assert!(ciphertext_hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_wrong_key_is_rejected() {
        let encrypted = encrypt(b"rows", "secret").unwrap();
        let err = decrypt(&encrypted, "other-secret").unwrap_err();
        assert!(matches!(err, Error::Encryption { .. }));
    }

    #[test]
    fn test_tampered_ciphertext_is_rejected() {
        let encrypted = encrypt(b"rows", "secret").unwrap();
        let mut text = String::from_utf8(encrypted).unwrap();

        // Flip the last hex digit of the ciphertext.
        let last = text.pop().unwrap();
        text.push(if last == '0' { '1' } else { '0' });

        assert!(decrypt(text.as_bytes(), "secret").is_err());
    }

    #[test]
    fn test_unframed_payload_is_rejected() {
        let err = decrypt(b"not hex at all", "secret").unwrap_err();
        assert!(matches!(err, Error::Encryption { .. }));
    }
}
