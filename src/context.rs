//! Shared runtime context handed to every command.

use sqlx::SqlitePool;

use crate::config::Config;
use crate::error::Result;
use crate::store;

/// Configuration, the metadata store pool, and one HTTP client reused for
/// provider calls and page fetches. Built once in `main` and passed down;
/// nothing in the pipeline reaches for global state.
pub struct AppContext {
    pub config: Config,
    pub pool: SqlitePool,
    pub http: reqwest::Client,
}

impl AppContext {
    /// Open the metadata store, run migrations, and build the shared HTTP
    /// client.
    ///
    /// Migrations are idempotent, so commands work against a fresh data
    /// directory without a prior `init`.
    pub async fn init(config: Config) -> Result<Self> {
        let pool = store::connect(&config.storage.db_path).await?;
        store::run_migrations(&pool).await?;

        let http = reqwest::Client::builder()
            .user_agent(concat!("docqa/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { config, pool, http })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn init_creates_database_file() {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.db_path = dir.path().join("data/meta.db");
        config.storage.index_dir = dir.path().join("data/index");

        let ctx = AppContext::init(config).await.unwrap();
        assert!(ctx.config.storage.db_path.exists());
        assert_eq!(crate::store::count(&ctx.pool).await.unwrap(), 0);
    }
}
