// Blockchain module
//
// This module contains the ledger core:
// - Canonical encoding used for hashing, signing and the wire
// - Transaction structure and signature verification
// - Transaction pool
// - Proof of work search
// - Block and blockchain structures

pub mod block;
pub mod chain;
pub mod codec;
pub mod crypto;
pub mod pool;
pub mod pow;
pub mod transaction;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Blockchain, ChainEnvelope};
pub use crypto::{Address, Wallet};
pub use transaction::{Transaction, TransactionError, TransactionRequest};
