use std::sync::Arc;

use futures::future::join_all;
use log::{error, info, warn};
use tokio::sync::RwLock;

use super::peer::{NeighborSource, PeerClient};
use super::resolver;
use crate::blockchain::{Address, Block, Blockchain, Transaction, TransactionError, TransactionRequest};

/// A ledger plus its view of the network.
///
/// Constructed once at startup and shared by reference with the HTTP
/// handlers and the periodic tasks.
pub struct LedgerNode {
    blockchain: Arc<Blockchain>,
    peers: Arc<dyn PeerClient>,
    discovery: Arc<dyn NeighborSource>,

    /// Guarded separately from the ledger; held only while refreshing
    neighbors: RwLock<Vec<String>>,

    /// Filtered out of discovered neighbors
    endpoint: String,
}

impl LedgerNode {
    pub fn new(
        blockchain: Blockchain,
        peers: Arc<dyn PeerClient>,
        discovery: Arc<dyn NeighborSource>,
        endpoint: String,
    ) -> Self {
        LedgerNode {
            blockchain: Arc::new(blockchain),
            peers,
            discovery,
            neighbors: RwLock::new(Vec::new()),
            endpoint,
        }
    }

    pub fn chain(&self) -> Vec<Block> {
        self.blockchain.chain()
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.blockchain.pending_transactions()
    }

    pub async fn neighbors(&self) -> Vec<String> {
        self.neighbors.read().await.clone()
    }

    /// Replaces the neighbor list from the discovery source
    pub async fn sync_neighbors(&self) {
        let mut neighbors = self.neighbors.write().await;
        let discovered = self.discovery.list_neighbor_endpoints().await;

        *neighbors = discovered
            .into_iter()
            .filter(|endpoint| endpoint != &self.endpoint)
            .collect();

        info!("Neighbors: {:?}", *neighbors);
    }

    /// Admits a client transaction and relays it to every neighbor
    pub async fn submit_transaction(&self, request: TransactionRequest) -> Result<(), TransactionError> {
        self.admit(&request)?;

        let neighbors = self.neighbors().await;
        let results = join_all(
            neighbors
                .iter()
                .map(|endpoint| self.peers.relay_transaction(endpoint, &request)),
        )
        .await;

        for (endpoint, result) in neighbors.iter().zip(results) {
            if let Err(err) = result {
                warn!("Failed to relay transaction to {}: {}", endpoint, err);
            }
        }

        Ok(())
    }

    /// Admits a transaction relayed by a neighbor, without relaying it again
    pub fn add_confirmed_transaction(&self, request: &TransactionRequest) -> Result<(), TransactionError> {
        self.admit(request)
    }

    fn admit(&self, request: &TransactionRequest) -> Result<(), TransactionError> {
        let signed = request.validate().map_err(|err| {
            warn!("Rejected transaction request: {}", err);
            err
        })?;

        self.blockchain
            .add_transaction(signed.transaction, Some(&signed.proof))
    }

    pub fn clear_pool(&self) {
        self.blockchain.clear_pool();
    }

    /// Mines once off the async executor, then tells neighbors to drop the
    /// transactions now confirmed
    pub async fn mine_once(&self) -> bool {
        let blockchain = Arc::clone(&self.blockchain);

        let mined = match tokio::task::spawn_blocking(move || blockchain.mine()).await {
            Ok(mined) => mined,
            Err(err) => {
                error!("Mining task failed: {}", err);
                false
            }
        };

        if mined {
            self.broadcast_clear_pool().await;
        }

        mined
    }

    async fn broadcast_clear_pool(&self) {
        let neighbors = self.neighbors().await;
        let results = join_all(neighbors.iter().map(|endpoint| self.peers.clear_pool(endpoint))).await;

        for (endpoint, result) in neighbors.iter().zip(results) {
            if let Err(err) = result {
                warn!("Failed to clear pool on {}: {}", endpoint, err);
            }
        }
    }

    pub async fn resolve_conflicts(&self) -> bool {
        let neighbors = self.neighbors().await;
        resolver::resolve_conflicts(&self.blockchain, self.peers.as_ref(), &neighbors).await
    }

    pub fn balance(&self, address: &Address) -> f64 {
        self.blockchain.total_balance(address)
    }
}
