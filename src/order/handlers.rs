use super::models::{
    ContactSource, ManualOrderForm, NewOrderProduct, Order, OrderDetail, OrderProduct,
    OrderProductForm, OrderStatus,
};
use crate::auth::extractors::{AuthUser, StaffUser};
use crate::product::models::Product;
use crate::session::SessionUser;
use crate::utils::types::{ApiResult, Pagination, Pool};
use crate::utils::{AppError, AppJson, FormErrors, ValidatedJson, internal_error};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use axum_store::schema::{order_products, orders, products, users};
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel::sql_types::Bool;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use tracing::info;
use uuid::Uuid;

/// Staff see every order, everybody else only their own. Newest first.
pub async fn get_orders(
    State(pool): State<Pool>,
    AuthUser(user): AuthUser,
    Query(page): Query<Pagination>,
) -> ApiResult<Vec<Order>> {
    let mut conn = pool.get().await.map_err(internal_error)?;

    let mut query = orders::table
        .select(Order::as_select())
        .order((orders::created_at.desc(), orders::id.desc()))
        .offset(page.offset())
        .limit(page.limit())
        .into_boxed();

    if !user.is_staff() {
        query = query.filter(orders::user_id.eq(user.id));
    }

    let res = query.load(&mut conn).await?;

    Ok(Json(res))
}

pub async fn get_order_by_id(
    State(pool): State<Pool>,
    AuthUser(user): AuthUser,
    Path(id): Path<i32>,
) -> ApiResult<OrderDetail> {
    let mut conn = pool.get().await.map_err(internal_error)?;

    let order = find_visible_order(&mut conn, id, &user).await?;
    let detail = load_detail(&mut conn, order).await?;

    Ok(Json(detail))
}

pub async fn create_order(
    State(pool): State<Pool>,
    StaffUser(staff): StaffUser,
    AppJson(payload): AppJson<ManualOrderForm>,
) -> Result<(StatusCode, Json<Order>), AppError> {
    payload
        .contact
        .check(payload.user_id.is_some(), ContactSource::Manual)
        .into_result()?;

    let mut conn = pool.get().await.map_err(internal_error)?;
    ensure_user_exists(&mut conn, payload.user_id).await?;

    let res = diesel::insert_into(orders::table)
        .values(payload.contact.into_new_order(payload.user_id))
        .returning(Order::as_returning())
        .get_result(&mut conn)
        .await?;

    info!(order_id = res.id, staff_id = %staff.id, "order created manually");

    Ok((StatusCode::CREATED, Json(res)))
}

pub async fn update_order(
    State(pool): State<Pool>,
    StaffUser(staff): StaffUser,
    Path(id): Path<i32>,
    AppJson(payload): AppJson<ManualOrderForm>,
) -> ApiResult<Order> {
    payload
        .contact
        .check(payload.user_id.is_some(), ContactSource::Manual)
        .into_result()?;

    let mut conn = pool.get().await.map_err(internal_error)?;
    ensure_user_exists(&mut conn, payload.user_id).await?;

    let res = diesel::update(orders::table.find(id))
        .set(payload.contact.into_changes(payload.user_id))
        .returning(Order::as_returning())
        .get_result(&mut conn)
        .await?;

    info!(order_id = res.id, staff_id = %staff.id, "order updated");

    Ok(Json(res))
}

pub async fn deliver_order(
    State(pool): State<Pool>,
    StaffUser(staff): StaffUser,
    Path(id): Path<i32>,
) -> ApiResult<Order> {
    set_status(&pool, id, OrderStatus::Delivered, &staff).await
}

pub async fn cancel_order(
    State(pool): State<Pool>,
    StaffUser(staff): StaffUser,
    Path(id): Path<i32>,
) -> ApiResult<Order> {
    set_status(&pool, id, OrderStatus::Canceled, &staff).await
}

pub async fn add_order_product(
    State(pool): State<Pool>,
    StaffUser(staff): StaffUser,
    Path(order_id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<OrderProductForm>,
) -> Result<(StatusCode, Json<OrderProduct>), AppError> {
    let mut conn = pool.get().await.map_err(internal_error)?;

    orders::table
        .find(order_id)
        .select(orders::id)
        .get_result::<i32>(&mut conn)
        .await?;
    ensure_product_exists(&mut conn, payload.product_id).await?;

    let res = diesel::insert_into(order_products::table)
        .values(NewOrderProduct {
            order_id,
            product_id: payload.product_id,
            amount: payload.amount,
        })
        .returning(OrderProduct::as_returning())
        .get_result(&mut conn)
        .await?;

    info!(order_id, line_id = res.id, staff_id = %staff.id, "order line added");

    Ok((StatusCode::CREATED, Json(res)))
}

pub async fn update_order_product(
    State(pool): State<Pool>,
    StaffUser(staff): StaffUser,
    Path((order_id, line_id)): Path<(i32, i32)>,
    ValidatedJson(payload): ValidatedJson<OrderProductForm>,
) -> ApiResult<OrderProduct> {
    let mut conn = pool.get().await.map_err(internal_error)?;

    ensure_product_exists(&mut conn, payload.product_id).await?;

    let res = diesel::update(
        order_products::table
            .filter(order_products::id.eq(line_id))
            .filter(order_products::order_id.eq(order_id)),
    )
    .set(NewOrderProduct {
        order_id,
        product_id: payload.product_id,
        amount: payload.amount,
    })
    .returning(OrderProduct::as_returning())
    .get_result(&mut conn)
    .await?;

    info!(order_id, line_id, staff_id = %staff.id, "order line updated");

    Ok(Json(res))
}

pub async fn remove_order_product(
    State(pool): State<Pool>,
    StaffUser(staff): StaffUser,
    Path((order_id, line_id)): Path<(i32, i32)>,
) -> Result<StatusCode, AppError> {
    let mut conn = pool.get().await.map_err(internal_error)?;

    let deleted = diesel::delete(
        order_products::table
            .filter(order_products::id.eq(line_id))
            .filter(order_products::order_id.eq(order_id)),
    )
    .execute(&mut conn)
    .await?;

    if deleted == 0 {
        return Err(AppError::NotFound("order line"));
    }

    info!(order_id, line_id, staff_id = %staff.id, "order line removed");

    Ok(StatusCode::NO_CONTENT)
}

/// Moves an order to `status` in one statement, so two concurrent changes
/// cannot both leave a final status.
async fn set_status(
    pool: &Pool,
    id: i32,
    status: OrderStatus,
    staff: &SessionUser,
) -> ApiResult<Order> {
    let mut conn = pool.get().await.map_err(internal_error)?;

    let target = orders::table
        .filter(orders::id.eq(id))
        .filter(accepts_status(status));

    let updated = diesel::update(target)
        .set(orders::status.eq(status))
        .returning(Order::as_returning())
        .get_result(&mut conn)
        .await
        .optional()?;

    if let Some(order) = updated {
        info!(order_id = id, status = status.as_str(), staff_id = %staff.id, "order status set");
        return Ok(Json(order));
    }

    let current = orders::table
        .find(id)
        .select(orders::status)
        .get_result::<OrderStatus>(&mut conn)
        .await
        .optional()?
        .ok_or(AppError::NotFound("order"))?;

    Err(AppError::Conflict(format!(
        "Order is already {} and cannot become {}",
        current.as_str(),
        status.as_str()
    )))
}

/// Rows whose status may become `status`: the same one, or any non-final one.
fn accepts_status(
    status: OrderStatus,
) -> Box<dyn BoxableExpression<orders::table, Pg, SqlType = Bool>> {
    Box::new(
        orders::status.eq(status).or(orders::status
            .ne(OrderStatus::Delivered)
            .and(orders::status.ne(OrderStatus::Canceled))),
    )
}

async fn find_visible_order(
    conn: &mut AsyncPgConnection,
    id: i32,
    user: &SessionUser,
) -> Result<Order, AppError> {
    let order = orders::table
        .find(id)
        .select(Order::as_select())
        .get_result(conn)
        .await?;

    if user.is_staff() || order.is_owned_by(user.id) {
        Ok(order)
    } else {
        Err(AppError::NotFound("order"))
    }
}

pub(crate) async fn load_detail(
    conn: &mut AsyncPgConnection,
    order: Order,
) -> Result<OrderDetail, AppError> {
    let rows = order_products::table
        .inner_join(products::table)
        .filter(order_products::order_id.eq(order.id))
        .order(order_products::id.asc())
        .select((OrderProduct::as_select(), Product::as_select()))
        .load::<(OrderProduct, Product)>(conn)
        .await?;

    Ok(OrderDetail::new(order, rows))
}

async fn ensure_user_exists(
    conn: &mut AsyncPgConnection,
    user_id: Option<Uuid>,
) -> Result<(), AppError> {
    let Some(user_id) = user_id else {
        return Ok(());
    };

    let found = users::table
        .find(user_id)
        .select(users::id)
        .first::<Uuid>(conn)
        .await
        .optional()?;

    if found.is_none() {
        let mut errors = FormErrors::default();
        errors.add("user_id", "Select a valid user.");
        return Err(AppError::Validation(errors));
    }

    Ok(())
}

async fn ensure_product_exists(conn: &mut AsyncPgConnection, product_id: i32) -> Result<(), AppError> {
    let found = products::table
        .find(product_id)
        .select(products::id)
        .first::<i32>(conn)
        .await
        .optional()?;

    if found.is_none() {
        let mut errors = FormErrors::default();
        errors.add("product_id", "Select a valid product.");
        return Err(AppError::Validation(errors));
    }

    Ok(())
}
