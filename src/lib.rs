use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_async::{AsyncConnection, AsyncPgConnection};
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

pub mod pool;
pub mod schema;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations/");

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Applies pending embedded migrations over a dedicated connection.
///
/// The migration harness is synchronous, so it runs on a blocking thread
/// behind the async connection wrapper.
pub async fn run_migrations(db_url: &str) -> Result<usize, BoxError> {
    let conn = AsyncPgConnection::establish(db_url).await?;
    let mut harness: AsyncConnectionWrapper<AsyncPgConnection> = AsyncConnectionWrapper::from(conn);

    let applied = tokio::task::spawn_blocking(move || {
        harness
            .run_pending_migrations(MIGRATIONS)
            .map(|versions| versions.len())
    })
    .await??;

    Ok(applied)
}
