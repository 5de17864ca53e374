use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;

use shopfloor_core::config::DatabaseConfig;

pub type DbPool = sqlx::SqlitePool;

/// Pool sized and timed from the application config.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, sqlx::Error> {
    connect_with_settings(&config.url, config.max_connections, config.timeout_secs).await
}

pub async fn connect_with_settings(
    database_url: &str,
    max_connections: u32,
    timeout_secs: u64,
) -> Result<DbPool, sqlx::Error> {
    let acquire_timeout = Duration::from_secs(timeout_secs.max(1));
    // A writer blocked on the WAL lock may wait as long as a pool acquire.
    let busy_timeout_ms = acquire_timeout.as_millis();

    SqlitePoolOptions::new()
        .max_connections(max_connections.max(1))
        .acquire_timeout(acquire_timeout)
        .after_connect(move |conn, _meta| {
            Box::pin(async move {
                sqlx::query("PRAGMA foreign_keys = ON").execute(&mut *conn).await?;
                sqlx::query("PRAGMA journal_mode = WAL").execute(&mut *conn).await?;
                sqlx::query("PRAGMA synchronous = NORMAL").execute(&mut *conn).await?;
                sqlx::query(&format!("PRAGMA busy_timeout = {busy_timeout_ms}"))
                    .execute(&mut *conn)
                    .await?;
                Ok(())
            })
        })
        .connect(database_url)
        .await
}

#[cfg(test)]
mod tests {
    use shopfloor_core::config::DatabaseConfig;

    use super::connect;

    #[tokio::test]
    async fn connect_applies_the_config_to_pool_and_pragmas() {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
            timeout_secs: 7,
        };
        let pool = connect(&config).await.expect("connect");

        let foreign_keys: i64 =
            sqlx::query_scalar("PRAGMA foreign_keys").fetch_one(&pool).await.expect("pragma");
        assert_eq!(foreign_keys, 1);

        let busy_timeout: i64 =
            sqlx::query_scalar("PRAGMA busy_timeout").fetch_one(&pool).await.expect("pragma");
        assert_eq!(busy_timeout, 7000);

        assert_eq!(pool.options().get_max_connections(), 1);
        pool.close().await;
    }
}
