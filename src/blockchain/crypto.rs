use rand::rngs::OsRng;
use ripemd::Ripemd160;
use secp256k1::ecdsa::Signature;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use utoipa::ToSchema;

use std::fmt;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Decoding error: {0}")]
    DecodingError(#[from] hex::FromHexError),
}

/// Version byte prepended to the RIPEMD-160 digest of a public key
const ADDRESS_VERSION: u8 = 0x00;

/// Represents a blockchain address
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Address(pub String);

impl Address {
    /// Derives the address of a public key.
    ///
    /// SHA-256 over the raw `X||Y` coordinates, RIPEMD-160 over that, a
    /// version byte in front and a 4 byte double SHA-256 checksum at the
    /// end, all base58 encoded.
    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let coordinates = &public_key.serialize_uncompressed()[1..];
        let digest = Ripemd160::digest(Sha256::digest(coordinates));

        let mut payload = Vec::with_capacity(25);
        payload.push(ADDRESS_VERSION);
        payload.extend_from_slice(&digest);

        let checksum = Sha256::digest(Sha256::digest(&payload));
        payload.extend_from_slice(&checksum[..4]);

        Address(bs58::encode(payload).into_string())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

/// Parses a public key from hex.
///
/// Accepts the raw 64 byte `X||Y` form used on the wire as well as SEC1
/// compressed and uncompressed encodings.
pub fn parse_public_key(encoded: &str) -> Result<PublicKey, CryptoError> {
    let mut bytes = hex::decode(encoded)?;

    if bytes.len() == 64 {
        bytes.insert(0, 0x04);
    }

    PublicKey::from_slice(&bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
}

/// Encodes a public key as 128 hex characters, `X` then `Y`
pub fn public_key_hex(public_key: &PublicKey) -> String {
    hex::encode(&public_key.serialize_uncompressed()[1..])
}

/// Represents an ECDSA signature as `r||s` in hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransactionSignature(pub String);

impl TransactionSignature {
    #[cfg(test)]
    pub fn from_signature(signature: &Signature) -> Self {
        TransactionSignature(hex::encode(signature.serialize_compact()))
    }

    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = hex::decode(&self.0)?;

        if bytes.len() != 64 {
            return Err(CryptoError::InvalidSignature(format!(
                "expected 64 bytes, got {}",
                bytes.len()
            )));
        }

        Signature::from_compact(&bytes).map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

impl fmt::Display for TransactionSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Verifies a signature over a 32 byte digest.
///
/// Never fails: malformed input is reported as an invalid signature.
pub fn verify_digest(digest: &[u8; 32], signature: &Signature, public_key: &PublicKey) -> bool {
    let secp = Secp256k1::verification_only();

    let message = match Message::from_slice(digest) {
        Ok(message) => message,
        Err(_) => return false,
    };

    // libsecp256k1 only accepts low-S signatures
    let mut signature = *signature;
    signature.normalize_s();

    secp.verify_ecdsa(&message, &signature, public_key).is_ok()
}

/// Represents a wallet with a keypair
#[derive(Debug, Clone)]
pub struct Wallet {
    secret_key: SecretKey,
    public_key: PublicKey,
    address: Address,
}

impl Wallet {
    /// Creates a new wallet with a random keypair
    pub fn new() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        let address = Address::from_public_key(&public_key);

        Wallet {
            secret_key,
            public_key,
            address,
        }
    }

    /// Gets the wallet's address
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Gets the wallet's public key
    #[cfg(test)]
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn public_key_hex(&self) -> String {
        public_key_hex(&self.public_key)
    }

    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Signs a 32 byte digest with the wallet's private key
    #[cfg(test)]
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<TransactionSignature, CryptoError> {
        let secp = Secp256k1::signing_only();
        let message =
            Message::from_slice(digest).map_err(|e| CryptoError::InvalidSignature(e.to_string()))?;
        let signature = secp.sign_ecdsa(&message, &self.secret_key);

        Ok(TransactionSignature::from_signature(&signature))
    }
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}
