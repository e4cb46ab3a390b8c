use super::models::{NewProduct, Product, ProductFilter, UpdateProduct};
use crate::auth::extractors::StaffUser;
use crate::utils::types::{ApiResult, Pagination, Pool};
use crate::utils::{AppError, ValidatedJson, internal_error};
use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
};
use axum_store::schema::products;
use diesel::pg::Pg;
use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use tracing::info;

/// Orderable products only.
pub async fn get_products(
    State(pool): State<Pool>,
    Query(filter): Query<ProductFilter>,
) -> ApiResult<Vec<Product>> {
    let mut conn = pool.get().await.map_err(internal_error)?;

    let res = listing_query(filter).load::<Product>(&mut conn).await?;

    Ok(Json(res))
}

/// Any product, soft-deleted ones included.
pub async fn get_product_by_id(
    State(pool): State<Pool>,
    Path(id): Path<i32>,
) -> ApiResult<Product> {
    let mut conn = pool.get().await.map_err(internal_error)?;

    let res = detail_query(id).get_result::<Product>(&mut conn).await?;

    Ok(Json(res))
}

pub async fn create_product(
    State(pool): State<Pool>,
    StaffUser(staff): StaffUser,
    ValidatedJson(payload): ValidatedJson<NewProduct>,
) -> Result<(StatusCode, Json<Product>), AppError> {
    let mut conn = pool.get().await.map_err(internal_error)?;

    let res = diesel::insert_into(products::table)
        .values(&payload)
        .returning(Product::as_returning())
        .get_result(&mut conn)
        .await?;

    info!(product_id = res.id, staff_id = %staff.id, "product created");

    Ok((StatusCode::CREATED, Json(res)))
}

pub async fn update_product(
    State(pool): State<Pool>,
    StaffUser(staff): StaffUser,
    Path(id): Path<i32>,
    ValidatedJson(payload): ValidatedJson<UpdateProduct>,
) -> ApiResult<Product> {
    let mut conn = pool.get().await.map_err(internal_error)?;

    if payload.is_empty() {
        let res = detail_query(id).get_result::<Product>(&mut conn).await?;
        return Ok(Json(res));
    }

    let res = diesel::update(products::table.find(id))
        .set(&payload)
        .returning(Product::as_returning())
        .get_result(&mut conn)
        .await?;

    info!(product_id = res.id, staff_id = %staff.id, "product updated");

    Ok(Json(res))
}

/// Withdraws the product from sale. The row stays for existing order lines.
pub async fn remove_product(
    State(pool): State<Pool>,
    StaffUser(staff): StaffUser,
    Path(id): Path<i32>,
) -> ApiResult<Product> {
    let mut conn = pool.get().await.map_err(internal_error)?;

    let res = diesel::update(products::table.find(id))
        .set(products::in_order.eq(false))
        .returning(Product::as_returning())
        .get_result(&mut conn)
        .await?;

    info!(product_id = res.id, staff_id = %staff.id, "product withdrawn from sale");

    Ok(Json(res))
}

fn listing_query(filter: ProductFilter) -> products::BoxedQuery<'static, Pg> {
    let page = Pagination {
        offset: filter.offset,
        limit: filter.limit,
    };

    let mut query = products::table
        .filter(products::in_order.eq(true))
        .order(products::id.asc())
        .offset(page.offset())
        .limit(page.limit())
        .into_boxed();

    if let Some(category) = filter.category.filter(|c| !c.is_empty()) {
        query = query.filter(products::category.eq(category));
    }

    query
}

fn detail_query(id: i32) -> products::BoxedQuery<'static, Pg> {
    products::table.filter(products::id.eq(id)).into_boxed()
}
