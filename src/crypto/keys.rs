//! ECDSA keys and base58check addresses
//!
//! Keys live on the secp256k1 curve. An address is the network's version byte
//! followed by the 20-byte public key hash, base58 encoded with a 4-byte
//! double-SHA-256 checksum.

use k256::ecdsa::SigningKey;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use super::{double_sha256, sha256};

/// Key and address errors
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid base58 encoding")]
    InvalidEncoding,
    #[error("Invalid address length: {0}")]
    InvalidLength(usize),
    #[error("Invalid checksum")]
    InvalidChecksum,
    #[error("Address version {found} does not match network version {expected}")]
    WrongNetwork { found: u8, expected: u8 },
}

/// 20-byte hash of a compressed public key, the payload of an address
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PubKeyHash(pub [u8; 20]);

impl PubKeyHash {
    /// Hash a serialized public key
    pub fn from_public_key(public_key: &[u8]) -> Self {
        let digest = double_sha256(&sha256(public_key).0);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest.0[..20]);
        PubKeyHash(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PubKeyHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PubKeyHash({})", self.to_hex())
    }
}

/// An ECDSA key pair
#[derive(Clone)]
pub struct EcKey {
    signing_key: SigningKey,
}

impl fmt::Debug for EcKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EcKey")
            .field("pubkey_hash", &self.pubkey_hash())
            .finish_non_exhaustive()
    }
}

impl EcKey {
    /// Generate a new random key
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::random(&mut OsRng),
        }
    }

    /// Import from 32 private key bytes
    pub fn from_private_key_bytes(bytes: &[u8; 32]) -> Result<Self, KeyError> {
        SigningKey::from_slice(bytes)
            .map(|signing_key| Self { signing_key })
            .map_err(|_| KeyError::InvalidPrivateKey)
    }

    /// Export private key bytes
    pub fn private_key_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    /// Compressed SEC1 public key (33 bytes)
    pub fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key
            .verifying_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec()
    }

    pub fn pubkey_hash(&self) -> PubKeyHash {
        PubKeyHash::from_public_key(&self.public_key_bytes())
    }

    /// Address of this key on a network with the given version byte
    pub fn to_address(&self, address_header: u8) -> Address {
        Address::new(address_header, self.pubkey_hash())
    }
}

/// A versioned, checksummed public key hash
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    version: u8,
    hash: PubKeyHash,
}

impl Address {
    pub fn new(version: u8, hash: PubKeyHash) -> Self {
        Self { version, hash }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn pubkey_hash(&self) -> PubKeyHash {
        self.hash
    }

    /// Decode a base58check address, requiring the given version byte
    pub fn from_base58(encoded: &str, expected_version: u8) -> Result<Self, KeyError> {
        let decoded = bs58::decode(encoded)
            .into_vec()
            .map_err(|_| KeyError::InvalidEncoding)?;

        if decoded.len() != 25 {
            return Err(KeyError::InvalidLength(decoded.len()));
        }

        let (payload, checksum) = decoded.split_at(21);
        if checksum != &double_sha256(payload).0[..4] {
            return Err(KeyError::InvalidChecksum);
        }

        let version = payload[0];
        if version != expected_version {
            return Err(KeyError::WrongNetwork {
                found: version,
                expected: expected_version,
            });
        }

        let mut hash = [0u8; 20];
        hash.copy_from_slice(&payload[1..]);
        Ok(Self::new(version, PubKeyHash(hash)))
    }

    pub fn to_base58(&self) -> String {
        let mut payload = Vec::with_capacity(25);
        payload.push(self.version);
        payload.extend_from_slice(&self.hash.0);
        let checksum = double_sha256(&payload);
        payload.extend_from_slice(&checksum.0[..4]);
        bs58::encode(payload).into_string()
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_base58())
    }
}
