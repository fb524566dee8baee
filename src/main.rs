use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::{debug, info};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod blockchain;
mod config;
mod node;

use config::NodeConfig;

// Use the configured miner address, or create a fresh wallet for this run
fn miner_address(config: &NodeConfig) -> blockchain::Address {
    match &config.miner_address {
        Some(address) => blockchain::Address(address.clone()),
        None => {
            let wallet = blockchain::Wallet::new();
            info!("Created miner wallet with address: {}", wallet.address());
            info!("Miner wallet public key: {}", wallet.public_key_hex());
            debug!("Miner wallet private key: {}", wallet.secret_key_hex());
            wallet.address().clone()
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_chain,
        api::handlers::get_transactions,
        api::handlers::create_transaction,
        api::handlers::update_transaction,
        api::handlers::delete_transactions,
        api::handlers::mine,
        api::handlers::start_mining,
        api::handlers::stop_mining,
        api::handlers::get_amount,
        api::handlers::resolve_conflicts
    ),
    components(
        schemas(
            blockchain::Block,
            blockchain::Transaction,
            blockchain::TransactionRequest,
            blockchain::ChainEnvelope,
            api::schema::TransactionsResponse,
            api::schema::AmountResponse,
            api::schema::MessageResponse
        )
    ),
    tags(
        (name = "ledger", description = "Proof of work ledger node")
    ),
    info(
        title = "Ledger Node API",
        version = "0.1.0",
        description = "A proof of work ledger node",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logger
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = NodeConfig::from_env();

    let peers = node::HttpPeerClient::new(config.peer_timeout)
        .context("failed to build peer HTTP client")?;
    let discovery = node::StaticNeighbors::new(config.neighbors.clone());
    let blockchain = blockchain::Blockchain::with_config(miner_address(&config), &config);

    info!(
        "Ledger ready: difficulty={}, rewards to {}",
        blockchain.difficulty(),
        blockchain.miner_address()
    );

    let ledger_node = Arc::new(node::LedgerNode::new(
        blockchain,
        Arc::new(peers),
        Arc::new(discovery),
        config.advertised_endpoint(),
    ));

    let supervisor = Arc::new(node::Supervisor::new());
    supervisor.start_neighbor_sync(Arc::clone(&ledger_node), config.neighbor_refresh_interval);
    supervisor.start_conflict_resolution(Arc::clone(&ledger_node), config.sync_interval);
    if config.auto_mine {
        supervisor.start_mining(Arc::clone(&ledger_node), config.mining_interval);
    }

    let state = web::Data::new(api::AppState {
        node: Arc::clone(&ledger_node),
        supervisor: Arc::clone(&supervisor),
        mining_interval: config.mining_interval,
    });

    info!("Starting HTTP server at http://{}:{}", config.host, config.port);

    // Start HTTP server
    HttpServer::new(move || {
        // Configure CORS
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        // Configure OpenAPI documentation
        let openapi = ApiDoc::openapi();

        App::new()
            .wrap(middleware::Logger::default())
            .wrap(cors)
            .app_data(state.clone())
            // API routes
            .configure(api::configure_routes)
            // Swagger UI
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone())
            )
    })
    .bind((config.host.as_str(), config.port))
    .with_context(|| format!("failed to bind {}:{}", config.host, config.port))?
    .run()
    .await?;

    supervisor.shutdown().await;
    Ok(())
}
