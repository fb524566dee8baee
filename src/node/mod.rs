// Node module
//
// Networked orchestration around the ledger:
// - Peer client and neighbor discovery boundary
// - Longest-chain conflict resolution
// - The node service the HTTP layer calls into
// - Supervisor for the periodic tasks

pub mod peer;
pub mod resolver;
pub mod scheduler;
pub mod service;

pub use peer::{HttpPeerClient, StaticNeighbors};
pub use scheduler::{Supervisor, MINING};
pub use service::LedgerNode;
