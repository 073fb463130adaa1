use deadpool_runtime::Runtime;
use diesel_async::{
    AsyncPgConnection,
    pooled_connection::{AsyncDieselConnectionManager, deadpool::Pool},
};

use crate::config::ServerConfig;

pub type DbPool = Pool<AsyncPgConnection>;

pub fn build_pool(config: &ServerConfig) -> eyre::Result<DbPool> {
    let manager = AsyncDieselConnectionManager::<AsyncPgConnection>::new(&config.database_url);

    let pool = Pool::builder(manager)
        .max_size(config.database_max_connections)
        .wait_timeout(Some(config.database_acquire_timeout))
        .create_timeout(Some(config.database_acquire_timeout))
        .runtime(Runtime::Tokio1)
        .build()?;

    Ok(pool)
}
