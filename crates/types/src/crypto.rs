//! Cryptographic key pairs and signatures.
//!
//! Supports:
//! - ED25519: default validator keys
//! - BLS12-381: accepted for committees that already run BLS keys

use crate::HexError;
use sbor::prelude::*;
use std::fmt;
use std::str::FromStr;

/// Supported key types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, BasicSbor)]
pub enum KeyType {
    /// ED25519 - Fast, widely supported.
    Ed25519,
    /// BLS12-381 - Pairing-based keys.
    Bls12381,
}

impl FromStr for KeyType {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ed25519" => Ok(KeyType::Ed25519),
            "bls" | "bls12381" | "bls12-381" => Ok(KeyType::Bls12381),
            other => Err(KeyError::UnknownKeyType(other.to_string())),
        }
    }
}

/// A cryptographic key pair for signing.
#[derive(Clone)]
pub enum KeyPair {
    /// ED25519 key pair.
    Ed25519(ed25519_dalek::SigningKey),
    /// BLS12-381 key pair.
    Bls12381(blst::min_pk::SecretKey),
}

impl KeyPair {
    /// Generate a new random Ed25519 keypair.
    pub fn generate_ed25519() -> Self {
        let mut csprng = rand::rngs::OsRng;
        KeyPair::Ed25519(ed25519_dalek::SigningKey::generate(&mut csprng))
    }

    /// Generate a new random BLS12-381 keypair.
    pub fn generate_bls() -> Result<Self, KeyError> {
        let mut ikm = [0u8; 32];
        rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut ikm);
        Self::from_seed(KeyType::Bls12381, &ikm)
    }

    /// Deterministic Ed25519 keypair from a seed (for testing/simulation).
    pub fn ed25519_from_seed(seed: &[u8; 32]) -> Self {
        KeyPair::Ed25519(ed25519_dalek::SigningKey::from_bytes(seed))
    }

    /// Deterministic keypair of either type from a seed.
    pub fn from_seed(key_type: KeyType, seed: &[u8; 32]) -> Result<Self, KeyError> {
        match key_type {
            KeyType::Ed25519 => Ok(Self::ed25519_from_seed(seed)),
            KeyType::Bls12381 => blst::min_pk::SecretKey::key_gen(seed, &[])
                .map(KeyPair::Bls12381)
                .map_err(|e| KeyError::KeyGeneration(format!("{:?}", e))),
        }
    }

    /// Key type of this pair.
    pub fn key_type(&self) -> KeyType {
        match self {
            KeyPair::Ed25519(_) => KeyType::Ed25519,
            KeyPair::Bls12381(_) => KeyType::Bls12381,
        }
    }

    /// Sign a message.
    pub fn sign(&self, message: &[u8]) -> Signature {
        match self {
            KeyPair::Ed25519(signing_key) => {
                use ed25519_dalek::Signer;
                Signature::Ed25519(signing_key.sign(message).to_bytes().to_vec())
            }
            KeyPair::Bls12381(sk) => {
                Signature::Bls12381(sk.sign(message, &[], &[]).to_bytes().to_vec())
            }
        }
    }

    /// Get the public key.
    pub fn public_key(&self) -> PublicKey {
        match self {
            KeyPair::Ed25519(signing_key) => {
                PublicKey::Ed25519(signing_key.verifying_key().to_bytes())
            }
            KeyPair::Bls12381(sk) => PublicKey::Bls12381(sk.sk_to_pk().to_bytes().to_vec()),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print secret material.
        write!(f, "KeyPair({:?})", self.public_key())
    }
}

/// A public key for signature verification.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, BasicSbor)]
pub enum PublicKey {
    /// ED25519 public key (32 bytes).
    Ed25519([u8; 32]),
    /// BLS12-381 public key (48 bytes compressed).
    Bls12381(Vec<u8>),
}

impl PublicKey {
    /// Parse a hex encoded public key of the given type.
    pub fn from_hex(key_type: KeyType, hex_str: &str) -> Result<Self, HexError> {
        let bytes = hex::decode(hex_str).map_err(|_| HexError::InvalidHex)?;
        match key_type {
            KeyType::Ed25519 => {
                let arr: [u8; 32] =
                    bytes
                        .as_slice()
                        .try_into()
                        .map_err(|_| HexError::InvalidLength {
                            expected: 64,
                            actual: hex_str.len(),
                        })?;
                ed25519_dalek::VerifyingKey::from_bytes(&arr).map_err(|_| HexError::InvalidKey)?;
                Ok(PublicKey::Ed25519(arr))
            }
            KeyType::Bls12381 => {
                blst::min_pk::PublicKey::from_bytes(&bytes).map_err(|_| HexError::InvalidKey)?;
                Ok(PublicKey::Bls12381(bytes))
            }
        }
    }

    /// Hex encoding of the raw key bytes.
    pub fn to_hex(&self) -> String {
        match self {
            PublicKey::Ed25519(bytes) => hex::encode(bytes),
            PublicKey::Bls12381(bytes) => hex::encode(bytes),
        }
    }

    /// Verify a signature.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> bool {
        match (self, signature) {
            (PublicKey::Ed25519(pk_bytes), Signature::Ed25519(sig_bytes)) => {
                use ed25519_dalek::Verifier;
                let pk = match ed25519_dalek::VerifyingKey::from_bytes(pk_bytes) {
                    Ok(pk) => pk,
                    Err(_) => return false,
                };
                let sig_array: [u8; 64] = match sig_bytes.as_slice().try_into() {
                    Ok(arr) => arr,
                    Err(_) => return false,
                };
                let sig = ed25519_dalek::Signature::from_bytes(&sig_array);
                pk.verify(message, &sig).is_ok()
            }
            (PublicKey::Bls12381(pk_bytes), Signature::Bls12381(sig_bytes)) => {
                let pk = match blst::min_pk::PublicKey::from_bytes(pk_bytes) {
                    Ok(pk) => pk,
                    Err(_) => return false,
                };
                let sig = match blst::min_pk::Signature::from_bytes(sig_bytes) {
                    Ok(sig) => sig,
                    Err(_) => return false,
                };
                sig.verify(true, message, &[], &[], &pk, true) == blst::BLST_ERROR::BLST_SUCCESS
            }
            _ => false, // Mismatched types
        }
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        match self {
            PublicKey::Ed25519(_) => write!(f, "PublicKey::Ed25519({}..)", &hex[..16]),
            PublicKey::Bls12381(_) => write!(
                f,
                "PublicKey::Bls12381({}..{})",
                &hex[..8],
                &hex[hex.len().saturating_sub(8)..]
            ),
        }
    }
}

/// A cryptographic signature.
#[derive(Clone, PartialEq, Eq, BasicSbor)]
pub enum Signature {
    /// ED25519 signature (64 bytes).
    Ed25519(Vec<u8>),
    /// BLS12-381 signature (96 bytes compressed).
    Bls12381(Vec<u8>),
}

impl Signature {
    /// Create a zero/placeholder signature for testing.
    pub fn zero() -> Self {
        Signature::Ed25519(vec![0u8; 64])
    }

    /// Get signature as byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Signature::Ed25519(bytes) => bytes.as_slice(),
            Signature::Bls12381(bytes) => bytes.as_slice(),
        }
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = hex::encode(self.as_bytes());
        let prefix = &hex[..hex.len().min(16)];
        match self {
            Signature::Ed25519(_) => write!(f, "Signature::Ed25519({}..)", prefix),
            Signature::Bls12381(_) => write!(f, "Signature::Bls12381({}..)", prefix),
        }
    }
}

/// Errors from key construction.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("Unknown key type: {0}")]
    UnknownKeyType(String),

    #[error("Key generation failed: {0}")]
    KeyGeneration(String),
}
