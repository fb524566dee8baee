use actix_web::web;

use super::handlers;

/// Configures the API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/chain", web::get().to(handlers::get_chain))
        .service(
            web::resource("/transactions")
                .route(web::get().to(handlers::get_transactions))
                .route(web::post().to(handlers::create_transaction))
                .route(web::put().to(handlers::update_transaction))
                .route(web::delete().to(handlers::delete_transactions)),
        )
        .route("/mine", web::get().to(handlers::mine))
        .route("/mine/start", web::get().to(handlers::start_mining))
        .route("/mine/stop", web::get().to(handlers::stop_mining))
        .route("/amount", web::get().to(handlers::get_amount))
        .route("/consensus", web::put().to(handlers::resolve_conflicts));
}
