use axum::{
    Router,
    routing::{get, post},
};

use super::handlers;
use crate::state::AppState;

pub fn get_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/basket",
            get(handlers::get_basket).post(handlers::create_order_from_basket),
        )
        .route("/basket/change", post(handlers::change_basket))
}
