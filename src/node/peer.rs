use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::blockchain::{Block, ChainEnvelope, TransactionRequest};

/// Errors talking to a neighbor. Callers log these and move on.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("Failed to build HTTP client: {0}")]
    ClientError(reqwest::Error),

    #[error("Request to {endpoint} failed: {source}")]
    RequestError {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{endpoint} answered with status {status}")]
    StatusError { endpoint: String, status: u16 },
}

/// Operations this node performs against a neighbor
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Reads the neighbor's full chain
    async fn fetch_chain(&self, endpoint: &str) -> Result<Vec<Block>, NetworkError>;

    /// Asks the neighbor to drop its pending transactions
    async fn clear_pool(&self, endpoint: &str) -> Result<(), NetworkError>;

    /// Forwards a client transaction for admission without further relay
    async fn relay_transaction(
        &self,
        endpoint: &str,
        request: &TransactionRequest,
    ) -> Result<(), NetworkError>;
}

/// Source of neighbor endpoints, refreshed periodically
#[async_trait]
pub trait NeighborSource: Send + Sync {
    async fn list_neighbor_endpoints(&self) -> Vec<String>;
}

/// A fixed neighbor list, typically from configuration
#[derive(Debug, Clone, Default)]
pub struct StaticNeighbors {
    endpoints: Vec<String>,
}

impl StaticNeighbors {
    pub fn new(endpoints: Vec<String>) -> Self {
        StaticNeighbors { endpoints }
    }
}

#[async_trait]
impl NeighborSource for StaticNeighbors {
    async fn list_neighbor_endpoints(&self) -> Vec<String> {
        self.endpoints.clone()
    }
}

/// `PeerClient` over plain HTTP with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpPeerClient {
    client: Client,
}

impl HttpPeerClient {
    pub fn new(timeout: Duration) -> Result<Self, NetworkError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NetworkError::ClientError)?;

        Ok(HttpPeerClient { client })
    }

    fn url(endpoint: &str, path: &str) -> String {
        format!("http://{}{}", endpoint, path)
    }

    fn check(endpoint: &str, response: reqwest::Response) -> Result<reqwest::Response, NetworkError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(NetworkError::StatusError {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            })
        }
    }

    fn request_error(endpoint: &str) -> impl FnOnce(reqwest::Error) -> NetworkError + '_ {
        move |source| NetworkError::RequestError {
            endpoint: endpoint.to_string(),
            source,
        }
    }
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn fetch_chain(&self, endpoint: &str) -> Result<Vec<Block>, NetworkError> {
        let response = self
            .client
            .get(Self::url(endpoint, "/chain"))
            .send()
            .await
            .map_err(Self::request_error(endpoint))?;

        let envelope: ChainEnvelope = Self::check(endpoint, response)?
            .json()
            .await
            .map_err(Self::request_error(endpoint))?;

        Ok(envelope.chain)
    }

    async fn clear_pool(&self, endpoint: &str) -> Result<(), NetworkError> {
        let response = self
            .client
            .delete(Self::url(endpoint, "/transactions"))
            .send()
            .await
            .map_err(Self::request_error(endpoint))?;

        Self::check(endpoint, response).map(|_| ())
    }

    async fn relay_transaction(
        &self,
        endpoint: &str,
        request: &TransactionRequest,
    ) -> Result<(), NetworkError> {
        let response = self
            .client
            .put(Self::url(endpoint, "/transactions"))
            .json(request)
            .send()
            .await
            .map_err(Self::request_error(endpoint))?;

        Self::check(endpoint, response).map(|_| ())
    }
}
