//! Canonical encoding shared by hashing, signing and the wire format.
//!
//! Objects are rendered as compact JSON with keys in schema order
//! (`preserve_order` keeps `json!` insertion order). The serde structs
//! declare their fields in the same order, so a block serialized for a
//! peer hashes to the same digest the peer computes.

use serde::{Deserialize, Deserializer, Serializer};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use super::transaction::Transaction;

/// A SHA-256 digest
pub type HashDigest = [u8; 32];

pub fn transaction_value(transaction: &Transaction) -> Value {
    json!({
        "sender_blockchain_address": transaction.sender.as_str(),
        "recipient_blockchain_address": transaction.recipient.0,
        "value": transaction.value,
    })
}

pub fn encode_transaction(transaction: &Transaction) -> Vec<u8> {
    transaction_value(transaction).to_string().into_bytes()
}

/// Encodes a block from its parts, letting the miner encode candidates
/// without assembling a `Block` per nonce
pub fn encode_block(
    timestamp: i64,
    nonce: u64,
    previous_hash: &HashDigest,
    transactions: &[Transaction],
) -> Vec<u8> {
    let transactions: Vec<Value> = transactions.iter().map(transaction_value).collect();

    json!({
        "timestamp": timestamp,
        "nonce": nonce,
        "previous-hash": hex::encode(previous_hash),
        "transactions": transactions,
    })
    .to_string()
    .into_bytes()
}

pub fn sha256(bytes: &[u8]) -> HashDigest {
    Sha256::digest(bytes).into()
}

/// Number of leading `'0'` characters in the lowercase hex form of `digest`
pub fn leading_zero_nibbles(digest: &HashDigest) -> usize {
    let mut count = 0;
    for byte in digest {
        if *byte == 0 {
            count += 2;
            continue;
        }
        if *byte >> 4 == 0 {
            count += 1;
        }
        break;
    }
    count
}

/// Serde adapter for digests carried as lowercase hex strings
pub mod hex_digest {
    use super::*;

    pub fn serialize<S>(digest: &HashDigest, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(digest))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<HashDigest, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let mut digest = [0u8; 32];
        hex::decode_to_slice(&encoded, &mut digest).map_err(serde::de::Error::custom)?;
        Ok(digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::Address;

    #[test]
    fn test_transaction_encoding_is_stable() {
        let transaction = Transaction::new(Address::from("A"), Address::from("B"), 1.5);

        let first = encode_transaction(&transaction);
        let second = encode_transaction(&transaction.clone());

        assert_eq!(first, second);
        assert_eq!(
            String::from_utf8(first).unwrap(),
            r#"{"sender_blockchain_address":"A","recipient_blockchain_address":"B","value":1.5}"#
        );
    }

    #[test]
    fn test_block_encoding_layout() {
        let encoded = encode_block(5, 7, &[0u8; 32], &[]);
        let expected = format!(
            r#"{{"timestamp":5,"nonce":7,"previous-hash":"{}","transactions":[]}}"#,
            "0".repeat(64)
        );

        assert_eq!(String::from_utf8(encoded).unwrap(), expected);

        let transaction = Transaction::new(Address::from("A"), Address::from("B"), 2.0);
        let encoded = String::from_utf8(encode_block(1, 2, &[0u8; 32], &[transaction])).unwrap();
        assert!(encoded.starts_with(r#"{"timestamp":1,"nonce":2,"#));
        assert!(encoded.ends_with(
            r#""transactions":[{"sender_blockchain_address":"A","recipient_blockchain_address":"B","value":2.0}]}"#
        ));
    }

    #[test]
    fn test_leading_zero_nibbles() {
        let mut digest = [0xffu8; 32];
        assert_eq!(leading_zero_nibbles(&digest), 0);

        digest[0] = 0x0f;
        assert_eq!(leading_zero_nibbles(&digest), 1);

        digest[0] = 0x00;
        digest[1] = 0x0a;
        assert_eq!(leading_zero_nibbles(&digest), 3);

        assert_eq!(leading_zero_nibbles(&[0u8; 32]), 64);
        assert_eq!(
            leading_zero_nibbles(&digest),
            hex::encode(digest).chars().take_while(|c| *c == '0').count()
        );
    }

    #[test]
    fn test_hex_digest_rejects_short_input() {
        #[derive(serde::Deserialize)]
        struct Wrapper {
            #[serde(with = "hex_digest")]
            #[allow(dead_code)]
            digest: HashDigest,
        }

        assert!(serde_json::from_str::<Wrapper>(r#"{"digest":"abcd"}"#).is_err());
        assert!(serde_json::from_str::<Wrapper>(&format!(r#"{{"digest":"{}"}}"#, "ab".repeat(32))).is_ok());
    }
}
