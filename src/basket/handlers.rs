use super::models::{BasketAction, BasketState, BasketSummary, ChangeBasket, order_lines};
use crate::order::models::{
    ContactForm, ContactSource, EMPTY_BASKET, Order, OrderPlaced, OrderProduct,
};
use crate::product::models::Product;
use crate::session::Session;
use crate::utils::types::{ApiResult, Pool};
use crate::utils::{AppError, AppJson, internal_error};
use axum::{
    extract::{Json, State},
    http::StatusCode,
};
use axum_store::schema::{order_products, orders, products};
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncConnection, RunQueryDsl};
use tracing::{debug, info};

pub async fn change_basket(
    State(pool): State<Pool>,
    session: Session,
    AppJson(payload): AppJson<ChangeBasket>,
) -> ApiResult<BasketState> {
    let pk = payload.pk;

    let state = match payload.action {
        BasketAction::Add => {
            let mut conn = pool.get().await.map_err(internal_error)?;

            let in_order = products::table
                .find(pk)
                .select(products::in_order)
                .get_result::<bool>(&mut conn)
                .await?;

            if in_order {
                session.update(|data| {
                    data.basket.add(pk);
                    data.basket.state()
                })
            } else {
                debug!(product_id = pk, "product is not orderable, basket unchanged");
                session.data().basket.state()
            }
        }
        BasketAction::Remove => session.update(|data| {
            data.basket.remove(pk);
            data.basket.state()
        }),
    };

    Ok(Json(state))
}

pub async fn get_basket(State(pool): State<Pool>, session: Session) -> ApiResult<BasketSummary> {
    let quantities = session.data().basket.quantities();

    if quantities.is_empty() {
        return Ok(Json(BasketSummary::empty()));
    }

    let ids: Vec<i32> = quantities.iter().map(|(id, _)| *id).collect();

    let mut conn = pool.get().await.map_err(internal_error)?;
    let rows = products::table
        .filter(products::id.eq_any(ids))
        .select(Product::as_select())
        .load(&mut conn)
        .await?;

    Ok(Json(BasketSummary::build(&quantities, rows)))
}

/// Turns the basket into an order with one line per distinct product, then
/// empties the basket. Nothing is written unless the form is valid.
pub async fn create_order_from_basket(
    State(pool): State<Pool>,
    session: Session,
    AppJson(payload): AppJson<ContactForm>,
) -> Result<(StatusCode, Json<OrderPlaced>), AppError> {
    let data = session.data();
    let user_id = data.user.as_ref().map(|user| user.id);

    let mut errors = payload.check(user_id.is_some(), ContactSource::Basket);
    if data.basket.is_empty() {
        errors.add_non_field(EMPTY_BASKET);
    }
    errors.into_result()?;

    let quantities = data.basket.quantities();
    let new_order = payload.into_new_order(user_id);

    let mut conn = pool.get().await.map_err(internal_error)?;

    let (order, lines) = conn
        .transaction::<_, AppError, _>(|conn| {
            async move {
                let order = diesel::insert_into(orders::table)
                    .values(&new_order)
                    .returning(Order::as_returning())
                    .get_result(conn)
                    .await?;

                let lines = diesel::insert_into(order_products::table)
                    .values(order_lines(order.id, &quantities))
                    .returning(OrderProduct::as_returning())
                    .get_results(conn)
                    .await?;

                Ok((order, lines))
            }
            .scope_boxed()
        })
        .await?;

    empty_basket(&session);

    info!(
        order_id = order.id,
        lines = lines.len(),
        user_id = ?user_id,
        "order placed from basket"
    );

    Ok((
        StatusCode::CREATED,
        Json(OrderPlaced {
            message: "Order placed",
            order,
            lines,
        }),
    ))
}

/// Runs after the order is committed. The login survives.
fn empty_basket(session: &Session) {
    session.update(|data| data.basket.clear());
}
