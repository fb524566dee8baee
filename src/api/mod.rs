// API module
//
// Thin HTTP surface over the node service. Peers use the same routes:
// `GET /chain`, `PUT /transactions` and `DELETE /transactions`.

pub mod handlers;
pub mod routes;
pub mod schema;

// Re-export main components for easier access
pub use handlers::AppState;
pub use routes::configure_routes;
