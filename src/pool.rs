use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::AsyncDieselConnectionManager;

pub type Pool = diesel_async::pooled_connection::bb8::Pool<AsyncPgConnection>;

pub async fn get_pool(db_url: &str, max_size: u32) -> Result<Pool, String> {
    let config = AsyncDieselConnectionManager::<AsyncPgConnection>::new(db_url);
    let pool = Pool::builder()
        .max_size(max_size)
        .build(config)
        .await
        .map_err(|e| format!("Failed to create db pool: {}", e))?;

    Ok(pool)
}
