use futures::future::join_all;
use log::{info, warn};

use super::peer::PeerClient;
use crate::blockchain::{Block, Blockchain};

/// Adopts the longest valid neighbor chain that beats the local one.
///
/// Neighbors are queried concurrently and scanned in list order, so among
/// equally long candidates the first listed wins. Unreachable neighbors and
/// invalid chains are logged and skipped. Returns whether the local chain
/// was replaced.
pub async fn resolve_conflicts(
    blockchain: &Blockchain,
    peers: &dyn PeerClient,
    neighbors: &[String],
) -> bool {
    let mut max_length = blockchain.len();
    let mut longest: Option<Vec<Block>> = None;

    let responses = join_all(
        neighbors
            .iter()
            .map(|endpoint| async move { (endpoint, peers.fetch_chain(endpoint).await) }),
    )
    .await;

    for (endpoint, response) in responses {
        let chain = match response {
            Ok(chain) => chain,
            Err(err) => {
                warn!("Skipping neighbor {}: {}", endpoint, err);
                continue;
            }
        };

        if chain.len() <= max_length {
            continue;
        }

        if !blockchain.validate_chain(&chain) {
            warn!(
                "Discarding chain of length {} from {}: failed validation",
                chain.len(),
                endpoint
            );
            continue;
        }

        max_length = chain.len();
        longest = Some(chain);
    }

    if let Some(chain) = longest {
        if blockchain.replace_chain(chain) {
            info!("Resolve conflicts replaced, length={}", max_length);
            return true;
        }
    }

    info!("Resolve conflicts not replaced");
    false
}
