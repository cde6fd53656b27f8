//! Copayer signing keys
//!
//! Each copayer of a multisig wallet holds one secp256k1 key. The key signs
//! proposal digests; the coordinator verifies those signatures against the
//! public keys of every registered copayer.

use rand::rngs::OsRng;
use secp256k1::{ecdsa, Message, PublicKey, Secp256k1, SecretKey};
use thiserror::Error;

use super::hash::sha256;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Invalid signature encoding")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A copayer's key. The secret half is absent for read-only copies.
#[derive(Clone, Debug)]
pub struct CopayerKey {
    secret_key: Option<SecretKey>,
    public_key: PublicKey,
}

impl CopayerKey {
    /// Generate a fresh random key
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key: Some(secret_key),
            public_key,
        }
    }

    /// Rebuild a key from its hex-encoded secret
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);
        Ok(Self {
            secret_key: Some(secret_key),
            public_key,
        })
    }

    /// A verify-only key
    pub fn from_public_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey)?;
        let public_key =
            PublicKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPublicKey)?;
        Ok(Self {
            secret_key: None,
            public_key,
        })
    }

    pub fn can_sign(&self) -> bool {
        self.secret_key.is_some()
    }

    pub fn private_key_hex(&self) -> Option<String> {
        self.secret_key.map(|k| hex::encode(k.secret_bytes()))
    }

    /// Compressed public key, hex encoded
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Sign a message; non-32-byte input is hashed first.
    /// Returns the compact signature, hex encoded.
    pub fn sign(&self, message: &[u8]) -> Result<String, KeyError> {
        let secret_key = self.secret_key.ok_or(KeyError::InvalidPrivateKey)?;
        let message = to_message(message)?;
        let signature = Secp256k1::new().sign_ecdsa(&message, &secret_key);
        Ok(hex::encode(signature.serialize_compact()))
    }

    /// Check a hex-encoded compact signature against this key.
    /// A well-formed signature from another key is `Ok(false)`.
    pub fn verify(&self, message: &[u8], signature_hex: &str) -> Result<bool, KeyError> {
        let bytes = hex::decode(signature_hex).map_err(|_| KeyError::InvalidSignature)?;
        let signature =
            ecdsa::Signature::from_compact(&bytes).map_err(|_| KeyError::InvalidSignature)?;
        let message = to_message(message)?;

        Ok(Secp256k1::new()
            .verify_ecdsa(&message, &signature, &self.public_key)
            .is_ok())
    }
}

fn to_message(data: &[u8]) -> Result<Message, KeyError> {
    let digest = if data.len() == 32 {
        data.to_vec()
    } else {
        sha256(data)
    };
    Ok(Message::from_digest_slice(&digest)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let key = CopayerKey::generate();
        let digest = sha256(b"proposal digest");

        let signature = key.sign(&digest).unwrap();
        assert!(key.verify(&digest, &signature).unwrap());
        assert!(!CopayerKey::generate().verify(&digest, &signature).unwrap());
    }

    #[test]
    fn test_hex_roundtrip_keeps_identity() {
        let key = CopayerKey::generate();
        let restored = CopayerKey::from_private_key_hex(&key.private_key_hex().unwrap()).unwrap();
        assert_eq!(key.public_key_hex(), restored.public_key_hex());
    }

    #[test]
    fn test_public_only_key_cannot_sign() {
        let key = CopayerKey::generate();
        let public = CopayerKey::from_public_key_hex(&key.public_key_hex()).unwrap();

        assert!(!public.can_sign());
        assert!(public.private_key_hex().is_none());
        assert!(matches!(public.sign(b"msg"), Err(KeyError::InvalidPrivateKey)));

        let signature = key.sign(b"msg").unwrap();
        assert!(public.verify(b"msg", &signature).unwrap());
    }

    #[test]
    fn test_garbage_signature_is_an_error() {
        let key = CopayerKey::generate();
        assert!(matches!(
            key.verify(b"msg", "zz"),
            Err(KeyError::InvalidSignature)
        ));
    }
}
