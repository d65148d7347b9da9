//! Optional per-page AES-CBC encryption, keyed by PBKDF2-HMAC-SHA1 (RFC
//! 2898) over the connection password and a per-database salt.
//!
//! Each page is encrypted independently with its own random 16-byte IV
//! prepended to the ciphertext; there's no cross-page chaining, so pages
//! can be read/written in any order, matching the rest of the disk layer.

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes256;
use rand::RngCore;

use crate::common::config::{ENCRYPTION_SALT_LEN, PAGE_SIZE, PBKDF2_ITERATIONS};
use crate::common::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Per-database AES-256 key, derived once at open time.
pub struct AesCbcCodec {
    key: [u8; KEY_LEN],
}

/// On-disk footprint of one encrypted page: a random IV prefix plus the
/// ciphertext, which is the same length as the plaintext page (AES-CBC
/// with no padding, since `PAGE_SIZE` is block-aligned).
pub const ENCRYPTED_PAGE_SIZE: usize = IV_LEN + PAGE_SIZE;

impl AesCbcCodec {
    /// Derive the page-encryption key from a password and salt via
    /// PBKDF2-HMAC-SHA1, matching upstream LiteDB's RFC-2898 parameters.
    pub fn derive(password: &str, salt: &[u8; ENCRYPTION_SALT_LEN]) -> Self {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
        Self { key }
    }

    /// Encrypt one page's bytes, returning `IV || ciphertext`.
    pub fn encrypt_page(&self, plaintext: &[u8; PAGE_SIZE]) -> [u8; ENCRYPTED_PAGE_SIZE] {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let mut buf = *plaintext;
        let ct = Aes256CbcEnc::new(&self.key.into(), &iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buf, PAGE_SIZE)
            .expect("PAGE_SIZE is AES-block aligned");

        let mut out = [0u8; ENCRYPTED_PAGE_SIZE];
        out[..IV_LEN].copy_from_slice(&iv);
        out[IV_LEN..].copy_from_slice(ct);
        out
    }

    /// Decrypt `IV || ciphertext` back into a plaintext page. Malformed
    /// input (wrong length, bad padding) surfaces as `Error::InvalidPassword`
    /// since in practice both causes trace back to the wrong key.
    pub fn decrypt_page(&self, encrypted: &[u8]) -> Result<[u8; PAGE_SIZE]> {
        if encrypted.len() != ENCRYPTED_PAGE_SIZE {
            return Err(Error::InvalidPassword);
        }
        let (iv, ct) = encrypted.split_at(IV_LEN);

        let mut buf = [0u8; PAGE_SIZE];
        buf.copy_from_slice(ct);

        let iv: [u8; IV_LEN] = iv.try_into().unwrap();
        Aes256CbcDec::new(&self.key.into(), &iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buf)
            .map_err(|_| Error::InvalidPassword)?;

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        let salt = [7u8; ENCRYPTION_SALT_LEN];
        let codec = AesCbcCodec::derive("hunter2", &salt);

        let mut plaintext = [0u8; PAGE_SIZE];
        plaintext[0] = 0xAB;
        plaintext[PAGE_SIZE - 1] = 0xCD;

        let encrypted = codec.encrypt_page(&plaintext);
        let decrypted = codec.decrypt_page(&encrypted).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_wrong_key_fails_or_garbles() {
        let salt = [1u8; ENCRYPTION_SALT_LEN];
        let codec_a = AesCbcCodec::derive("correct-password", &salt);
        let codec_b = AesCbcCodec::derive("wrong-password", &salt);

        let plaintext = [0x42u8; PAGE_SIZE];
        let encrypted = codec_a.encrypt_page(&plaintext);

        match codec_b.decrypt_page(&encrypted) {
            Ok(garbled) => assert_ne!(garbled, plaintext),
            Err(Error::InvalidPassword) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_different_salts_derive_different_keys() {
        let a = AesCbcCodec::derive("pw", &[1u8; ENCRYPTION_SALT_LEN]);
        let b = AesCbcCodec::derive("pw", &[2u8; ENCRYPTION_SALT_LEN]);
        assert_ne!(a.key, b.key);
    }

    #[test]
    fn test_bad_length_is_invalid_password() {
        let codec = AesCbcCodec::derive("pw", &[0u8; ENCRYPTION_SALT_LEN]);
        assert!(matches!(codec.decrypt_page(&[0u8; 10]), Err(Error::InvalidPassword)));
    }
}
