//! Proof of work over block candidates.
//!
//! Candidates are hashed with a zero timestamp so only the nonce varies
//! during the search; chain validation rebuilds the same candidate.

use super::codec::{self, HashDigest};
use super::transaction::Transaction;

/// Hash of the candidate block for `nonce`
pub fn candidate_hash(nonce: u64, previous_hash: &HashDigest, transactions: &[Transaction]) -> HashDigest {
    codec::sha256(&codec::encode_block(0, nonce, previous_hash, transactions))
}

/// Checks whether `nonce` yields a candidate hash with `difficulty`
/// leading zero hex digits
pub fn valid_proof(
    nonce: u64,
    previous_hash: &HashDigest,
    transactions: &[Transaction],
    difficulty: usize,
) -> bool {
    codec::leading_zero_nibbles(&candidate_hash(nonce, previous_hash, transactions)) >= difficulty
}

/// Finds the smallest nonce satisfying `valid_proof`.
///
/// Single threaded and unbounded; the caller holds the ledger lock for the
/// whole search.
pub fn solve(previous_hash: &HashDigest, transactions: &[Transaction], difficulty: usize) -> u64 {
    let mut nonce = 0;
    while !valid_proof(nonce, previous_hash, transactions, difficulty) {
        nonce += 1;
    }
    nonce
}
