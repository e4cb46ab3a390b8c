use axum::{
    Router,
    routing::{get, patch, post},
};

use super::handlers;
use crate::state::AppState;

pub fn get_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/orders",
            get(handlers::get_orders).post(handlers::create_order),
        )
        .route(
            "/orders/{id}",
            get(handlers::get_order_by_id).patch(handlers::update_order),
        )
        .route("/orders/{id}/deliver", post(handlers::deliver_order))
        .route("/orders/{id}/cancel", post(handlers::cancel_order))
        .route("/orders/{id}/products", post(handlers::add_order_product))
        .route(
            "/orders/{id}/products/{line_id}",
            patch(handlers::update_order_product).delete(handlers::remove_order_product),
        )
}
