use secp256k1::ecdsa::Signature;
use secp256k1::PublicKey;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use utoipa::ToSchema;

use super::codec::{self, HashDigest};
use super::crypto::{self, Address, CryptoError, TransactionSignature};
#[cfg(test)]
use super::crypto::Wallet;

/// Wire identity of the mining-reward issuer
pub const MINING_SENDER: &str = "THE BLOCKCHAIN";

/// Errors that can occur during transaction admission
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Sender address {0:?} is reserved for system-issued transactions")]
    ReservedSender(String),

    #[error("Invalid value {0}: transfers must be positive and finite")]
    InvalidValue(f64),

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: f64, available: f64 },

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// Who issued a transaction.
///
/// `System` is only ever constructed by the node itself for mining rewards
/// and is the one sender exempt from signature checks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Sender {
    System,
    Account(Address),
}

impl Sender {
    pub fn as_str(&self) -> &str {
        match self {
            Sender::System => MINING_SENDER,
            Sender::Account(address) => &address.0,
        }
    }

    pub fn is(&self, address: &Address) -> bool {
        matches!(self, Sender::Account(a) if a == address)
    }
}

impl Serialize for Sender {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Sender {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == MINING_SENDER {
            Ok(Sender::System)
        } else {
            Ok(Sender::Account(Address(raw)))
        }
    }
}

/// A value transfer recorded in a block.
///
/// Fields are declared in the order of the canonical encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Transaction {
    /// Sender's address, or the reserved mining sender
    #[serde(rename = "sender_blockchain_address")]
    #[schema(value_type = String)]
    pub sender: Sender,

    /// Recipient's address
    #[serde(rename = "recipient_blockchain_address")]
    #[schema(value_type = String)]
    pub recipient: Address,

    /// Amount being transferred
    pub value: f64,
}

impl Transaction {
    /// Creates a transfer between two accounts
    pub fn new(sender: Address, recipient: Address, value: f64) -> Self {
        Transaction {
            sender: Sender::Account(sender),
            recipient,
            value,
        }
    }

    /// Creates a system-issued mining reward
    pub fn reward(recipient: Address, value: f64) -> Self {
        Transaction {
            sender: Sender::System,
            recipient,
            value,
        }
    }

    #[cfg(test)]
    pub fn is_system(&self) -> bool {
        self.sender == Sender::System
    }

    /// Account transfers must move a positive, finite amount
    pub fn check_value(&self) -> Result<(), TransactionError> {
        match self.sender {
            Sender::Account(_) if !(self.value.is_finite() && self.value > 0.0) => {
                Err(TransactionError::InvalidValue(self.value))
            }
            _ => Ok(()),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        codec::encode_transaction(self)
    }

    /// SHA-256 of the canonical encoding, the message that gets signed
    pub fn digest(&self) -> HashDigest {
        codec::sha256(&self.to_bytes())
    }

    /// Checks the sender's signature over this transaction.
    ///
    /// System-issued transactions pass without credentials; account
    /// transfers fail when credentials are absent or do not match.
    pub fn verify(&self, proof: Option<&SenderProof>) -> bool {
        match (&self.sender, proof) {
            (Sender::System, _) => true,
            (Sender::Account(_), Some(proof)) => {
                crypto::verify_digest(&self.digest(), &proof.signature, &proof.public_key)
            }
            (Sender::Account(_), None) => false,
        }
    }
}

/// The public key and signature a sender presents at admission time
#[derive(Debug, Clone)]
pub struct SenderProof {
    pub public_key: PublicKey,
    pub signature: Signature,
}

/// A transaction together with the proof it was admitted with
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub transaction: Transaction,
    pub proof: SenderProof,
}

/// Client submission of a transfer. Every field is required.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TransactionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_blockchain_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_blockchain_address: Option<String>,

    /// Hex `X||Y` coordinates of the sender's public key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_public_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,

    /// Hex `r||s` of the signature over the transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl TransactionRequest {
    /// Builds a signed request for a transfer out of `wallet`
    #[cfg(test)]
    pub fn signed(wallet: &Wallet, recipient: &Address, value: f64) -> Result<Self, CryptoError> {
        let transaction = Transaction::new(wallet.address().clone(), recipient.clone(), value);
        let signature = wallet.sign_digest(&transaction.digest())?;

        Ok(TransactionRequest {
            sender_blockchain_address: Some(wallet.address().0.clone()),
            recipient_blockchain_address: Some(recipient.0.clone()),
            sender_public_key: Some(wallet.public_key_hex()),
            value: Some(value),
            signature: Some(signature.0),
        })
    }

    /// Checks that every field is present and decodes the credentials.
    ///
    /// Does not verify the signature; that happens at admission.
    pub fn validate(&self) -> Result<SignedTransaction, TransactionError> {
        let sender = self
            .sender_blockchain_address
            .as_ref()
            .ok_or(TransactionError::MissingField("sender_blockchain_address"))?;
        let recipient = self
            .recipient_blockchain_address
            .as_ref()
            .ok_or(TransactionError::MissingField("recipient_blockchain_address"))?;
        let public_key = self
            .sender_public_key
            .as_ref()
            .ok_or(TransactionError::MissingField("sender_public_key"))?;
        let value = self.value.ok_or(TransactionError::MissingField("value"))?;
        let signature = self
            .signature
            .as_ref()
            .ok_or(TransactionError::MissingField("signature"))?;

        if sender == MINING_SENDER {
            return Err(TransactionError::ReservedSender(sender.clone()));
        }

        let transaction = Transaction::new(Address(sender.clone()), Address(recipient.clone()), value);
        transaction.check_value()?;

        let proof = SenderProof {
            public_key: crypto::parse_public_key(public_key)?,
            signature: TransactionSignature(signature.clone()).to_signature()?,
        };

        Ok(SignedTransaction { transaction, proof })
    }
}
