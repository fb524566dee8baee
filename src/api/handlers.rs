use std::sync::Arc;
use std::time::Duration;

use actix_web::{web, HttpResponse, Responder};

use super::schema::{AmountQuery, AmountResponse, MessageResponse, TransactionsResponse};
use crate::blockchain::{Address, ChainEnvelope, TransactionRequest};
use crate::node::{LedgerNode, Supervisor, MINING};

/// Shared state handed to every handler
pub struct AppState {
    pub node: Arc<LedgerNode>,
    pub supervisor: Arc<Supervisor>,
    pub mining_interval: Duration,
}

pub type AppData = web::Data<AppState>;

/// Get the full blockchain
#[utoipa::path(
    get,
    path = "/chain",
    responses(
        (status = 200, description = "Blockchain retrieved successfully", body = ChainEnvelope)
    )
)]
pub async fn get_chain(state: AppData) -> impl Responder {
    HttpResponse::Ok().json(ChainEnvelope {
        chain: state.node.chain(),
    })
}

/// Get all pending transactions
#[utoipa::path(
    get,
    path = "/transactions",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = TransactionsResponse)
    )
)]
pub async fn get_transactions(state: AppData) -> impl Responder {
    let transactions = state.node.pending_transactions();

    HttpResponse::Ok().json(TransactionsResponse {
        length: transactions.len(),
        transactions,
    })
}

/// Submit a signed transaction
///
/// Admits the transaction and relays it to every neighbor
#[utoipa::path(
    post,
    path = "/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 201, description = "Transaction accepted", body = MessageResponse),
        (status = 400, description = "Transaction rejected", body = MessageResponse)
    )
)]
pub async fn create_transaction(
    state: AppData,
    request: web::Json<TransactionRequest>,
) -> impl Responder {
    match state.node.submit_transaction(request.into_inner()).await {
        Ok(()) => HttpResponse::Created().json(MessageResponse::new("success")),
        Err(err) => HttpResponse::BadRequest().json(MessageResponse::new(err.to_string())),
    }
}

/// Admit a transaction relayed by a neighbor
#[utoipa::path(
    put,
    path = "/transactions",
    request_body = TransactionRequest,
    responses(
        (status = 200, description = "Transaction accepted", body = MessageResponse),
        (status = 400, description = "Transaction rejected", body = MessageResponse)
    )
)]
pub async fn update_transaction(
    state: AppData,
    request: web::Json<TransactionRequest>,
) -> impl Responder {
    match state.node.add_confirmed_transaction(&request) {
        Ok(()) => HttpResponse::Ok().json(MessageResponse::new("success")),
        Err(err) => HttpResponse::BadRequest().json(MessageResponse::new(err.to_string())),
    }
}

/// Drop all pending transactions
#[utoipa::path(
    delete,
    path = "/transactions",
    responses(
        (status = 200, description = "Pool cleared", body = MessageResponse)
    )
)]
pub async fn delete_transactions(state: AppData) -> impl Responder {
    state.node.clear_pool();
    HttpResponse::Ok().json(MessageResponse::new("success"))
}

/// Mine the pending transactions once
#[utoipa::path(
    get,
    path = "/mine",
    responses(
        (status = 200, description = "Block mined", body = MessageResponse),
        (status = 400, description = "Nothing to mine", body = MessageResponse)
    )
)]
pub async fn mine(state: AppData) -> impl Responder {
    if state.node.mine_once().await {
        HttpResponse::Ok().json(MessageResponse::new("success"))
    } else {
        HttpResponse::BadRequest().json(MessageResponse::new("fail"))
    }
}

/// Start the recurring mining loop
#[utoipa::path(
    get,
    path = "/mine/start",
    responses(
        (status = 200, description = "Mining loop running", body = MessageResponse)
    )
)]
pub async fn start_mining(state: AppData) -> impl Responder {
    let started = state
        .supervisor
        .start_mining(Arc::clone(&state.node), state.mining_interval);

    HttpResponse::Ok().json(MessageResponse::new(if started {
        "success"
    } else {
        "already running"
    }))
}

/// Stop the recurring mining loop
///
/// Neighbor sync and conflict resolution keep running
#[utoipa::path(
    get,
    path = "/mine/stop",
    responses(
        (status = 200, description = "Mining loop stopped", body = MessageResponse)
    )
)]
pub async fn stop_mining(state: AppData) -> impl Responder {
    let stopped = state.supervisor.stop(MINING).await;

    HttpResponse::Ok().json(MessageResponse::new(if stopped {
        "success"
    } else {
        "not running"
    }))
}

/// Get the balance of an address
#[utoipa::path(
    get,
    path = "/amount",
    params(AmountQuery),
    responses(
        (status = 200, description = "Balance computed", body = AmountResponse)
    )
)]
pub async fn get_amount(state: AppData, query: web::Query<AmountQuery>) -> impl Responder {
    let address = Address(query.into_inner().blockchain_address);

    HttpResponse::Ok().json(AmountResponse {
        amount: state.node.balance(&address),
    })
}

/// Reconcile the chain against neighbors
#[utoipa::path(
    put,
    path = "/consensus",
    responses(
        (status = 200, description = "Resolution finished", body = MessageResponse)
    )
)]
pub async fn resolve_conflicts(state: AppData) -> impl Responder {
    let replaced = state.node.resolve_conflicts().await;

    HttpResponse::Ok().json(MessageResponse::new(if replaced {
        "replaced"
    } else {
        "not replaced"
    }))
}
