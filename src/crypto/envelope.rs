//! Passphrase envelope for wallet files
//!
//! 1. Argon2id derives a 256-bit key from the passphrase and a random salt
//! 2. AES-256-GCM encrypts the serialized wallet under a random 96-bit IV
//! 3. Everything needed to decrypt again is stored next to the ciphertext
//!
//! An envelope is recognised by its `ct` field. Plaintext wallet records never
//! carry that key at their top level.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Field that marks a JSON object as an envelope
pub const CIPHERTEXT_MARKER: &str = "ct";

const KDF_NAME: &str = "argon2id";
const CIPHER_NAME: &str = "aes-256-gcm";

const KDF_MEMORY_KIB: u32 = 19 * 1024;
const KDF_ITERATIONS: u32 = 2;
// Upper bounds accepted when opening a file
const KDF_MAX_MEMORY_KIB: u32 = 256 * 1024;
const KDF_MAX_ITERATIONS: u32 = 16;
const KEY_LEN: usize = 32;
const SALT_LEN: usize = 16;
const IV_LEN: usize = 12;

#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("wrong password")]
    WrongPassword,
    #[error("malformed envelope: {0}")]
    Malformed(String),
    #[error("cipher failure: {0}")]
    Cipher(String),
}

/// Ciphertext plus the parameters needed to open it
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    /// Hex ciphertext including the GCM tag
    pub ct: String,
    /// Hex IV
    pub iv: String,
    /// Hex KDF salt
    pub salt: String,
    /// KDF iteration count
    pub iter: u32,
    /// KDF memory cost in KiB
    pub mem: u32,
    pub kdf: String,
    pub cipher: String,
}

impl Envelope {
    /// Encrypt `plaintext` under `passphrase` with fresh salt and IV
    pub fn seal(plaintext: &str, passphrase: &str) -> Result<Self, EnvelopeError> {
        let mut rng = rand::thread_rng();
        let mut salt = [0u8; SALT_LEN];
        rng.fill_bytes(&mut salt);
        let mut iv = [0u8; IV_LEN];
        rng.fill_bytes(&mut iv);

        let key = derive_key(passphrase, &salt, KDF_ITERATIONS, KDF_MEMORY_KIB)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| EnvelopeError::Cipher(e.to_string()))?;
        let ct = cipher
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| EnvelopeError::Cipher(e.to_string()))?;

        Ok(Self {
            ct: hex::encode(ct),
            iv: hex::encode(iv),
            salt: hex::encode(salt),
            iter: KDF_ITERATIONS,
            mem: KDF_MEMORY_KIB,
            kdf: KDF_NAME.to_string(),
            cipher: CIPHER_NAME.to_string(),
        })
    }

    /// Decrypt with `passphrase`. Authentication failure is `WrongPassword`.
    pub fn open(&self, passphrase: &str) -> Result<String, EnvelopeError> {
        if self.kdf != KDF_NAME || self.cipher != CIPHER_NAME {
            return Err(EnvelopeError::Malformed(format!(
                "unsupported scheme {}/{}",
                self.kdf, self.cipher
            )));
        }

        if self.mem > KDF_MAX_MEMORY_KIB || self.iter > KDF_MAX_ITERATIONS {
            return Err(EnvelopeError::Malformed(format!(
                "kdf cost out of range (mem {} KiB, iter {})",
                self.mem, self.iter
            )));
        }

        let salt = decode_field("salt", &self.salt)?;
        let iv = decode_field("iv", &self.iv)?;
        let ct = decode_field("ct", &self.ct)?;
        if iv.len() != IV_LEN {
            return Err(EnvelopeError::Malformed(format!(
                "iv must be {} bytes, got {}",
                IV_LEN,
                iv.len()
            )));
        }

        let key = derive_key(passphrase, &salt, self.iter, self.mem)?;
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| EnvelopeError::Cipher(e.to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(&iv), ct.as_ref())
            .map_err(|_| EnvelopeError::WrongPassword)?;

        String::from_utf8(plaintext)
            .map_err(|_| EnvelopeError::Malformed("plaintext is not UTF-8".to_string()))
    }

    /// Whether a parsed JSON object is tagged as an envelope
    pub fn is_tagged(object: &Map<String, Value>) -> bool {
        object.contains_key(CIPHERTEXT_MARKER)
    }

    pub fn from_object(object: Map<String, Value>) -> Result<Self, EnvelopeError> {
        serde_json::from_value(Value::Object(object))
            .map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        serde_json::to_string(self).map_err(|e| EnvelopeError::Malformed(e.to_string()))
    }
}

fn decode_field(name: &str, value: &str) -> Result<Vec<u8>, EnvelopeError> {
    hex::decode(value).map_err(|e| EnvelopeError::Malformed(format!("{}: {}", name, e)))
}

fn derive_key(
    passphrase: &str,
    salt: &[u8],
    iterations: u32,
    memory_kib: u32,
) -> Result<[u8; KEY_LEN], EnvelopeError> {
    let params = Params::new(memory_kib, iterations, 1, Some(KEY_LEN))
        .map_err(|e| EnvelopeError::Malformed(format!("kdf params: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_LEN];
    argon2
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| EnvelopeError::Malformed(format!("kdf: {}", e)))?;
    Ok(key)
}
