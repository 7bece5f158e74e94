//! Connection pools for SQLite and MySQL behind one trait object

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    mysql::{MySqlPool, MySqlPoolOptions},
    sqlite::{SqlitePool, SqlitePoolOptions},
};
use std::path::Path;
use std::sync::Arc;

use crate::config::{DatabaseConfig, DatabaseDriver};

const SQLITE_MAX_CONNECTIONS: u32 = 16;
const MYSQL_MAX_CONNECTIONS: u32 = 24;

/// Backend-agnostic handle used by repositories and migrations
#[async_trait]
pub trait DatabasePool: Send + Sync {
    /// Run a statement that returns no rows, yielding rows affected
    async fn execute(&self, query: &str) -> Result<u64>;

    async fn ping(&self) -> Result<()>;

    async fn close(&self);

    fn driver(&self) -> DatabaseDriver;

    fn as_sqlite(&self) -> Option<&SqlitePool>;

    fn as_mysql(&self) -> Option<&MySqlPool>;
}

pub type DynDatabasePool = Arc<dyn DatabasePool>;

/// Where a SQLite URL points
#[derive(Debug, PartialEq, Eq)]
enum SqliteTarget {
    Memory,
    /// Connection URL plus the file path to create parent directories for
    File { url: String, path: String },
}

fn sqlite_target(raw: &str) -> SqliteTarget {
    let raw = raw.trim();
    if raw == ":memory:" || raw.starts_with("sqlite::memory:") {
        return SqliteTarget::Memory;
    }
    let path = raw.strip_prefix("sqlite://").or_else(|| raw.strip_prefix("sqlite:")).unwrap_or(raw);
    let path = path.split('?').next().unwrap_or(path).to_string();
    let url = match (raw.starts_with("sqlite:"), raw.contains('?')) {
        (true, true) => raw.to_string(),
        (true, false) => format!("{}?mode=rwc", raw),
        (false, _) => format!("sqlite:{}?mode=rwc", raw),
    };
    SqliteTarget::File { url, path }
}

fn mysql_url(raw: &str) -> String {
    if raw.starts_with("mysql://") {
        raw.to_string()
    } else {
        format!("mysql://{}", raw)
    }
}

pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (creating if needed) a SQLite database with foreign keys on.
    /// `:memory:` keeps a single connection alive so the schema survives.
    pub async fn new(url: &str) -> Result<Self> {
        let (options, connect_url) = match sqlite_target(url) {
            SqliteTarget::Memory => (
                SqlitePoolOptions::new()
                    .max_connections(1)
                    .idle_timeout(None)
                    .max_lifetime(None),
                "sqlite::memory:".to_string(),
            ),
            SqliteTarget::File { url: connect_url, path } => {
                if let Some(dir) = Path::new(&path).parent().filter(|d| !d.as_os_str().is_empty()) {
                    std::fs::create_dir_all(dir)
                        .with_context(|| format!("Failed to create database directory {:?}", dir))?;
                }
                (
                    SqlitePoolOptions::new().max_connections(SQLITE_MAX_CONNECTIONS),
                    connect_url,
                )
            }
        };

        let pool = options
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    sqlx::query("PRAGMA foreign_keys = ON").execute(conn).await?;
                    Ok(())
                })
            })
            .connect(&connect_url)
            .await
            .with_context(|| format!("Failed to open SQLite database {}", url))?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for SqliteDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        Ok(sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Statement failed: {}", query))?
            .rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Sqlite
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        Some(&self.pool)
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        None
    }
}

pub struct MysqlDatabase {
    pool: MySqlPool,
}

impl MysqlDatabase {
    pub async fn new(url: &str) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(MYSQL_MAX_CONNECTIONS)
            .connect(&mysql_url(url))
            .await
            .context("Failed to connect to MySQL")?;
        Ok(Self { pool })
    }
}

#[async_trait]
impl DatabasePool for MysqlDatabase {
    async fn execute(&self, query: &str) -> Result<u64> {
        Ok(sqlx::query(query)
            .execute(&self.pool)
            .await
            .with_context(|| format!("Statement failed: {}", query))?
            .rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database ping failed")?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }

    fn driver(&self) -> DatabaseDriver {
        DatabaseDriver::Mysql
    }

    fn as_sqlite(&self) -> Option<&SqlitePool> {
        None
    }

    fn as_mysql(&self) -> Option<&MySqlPool> {
        Some(&self.pool)
    }
}

/// Connect to the database named by `config`
pub async fn create_pool(config: &DatabaseConfig) -> Result<DynDatabasePool> {
    let pool: DynDatabasePool = match config.driver {
        DatabaseDriver::Sqlite => Arc::new(SqliteDatabase::new(&config.url).await?),
        DatabaseDriver::Mysql => Arc::new(MysqlDatabase::new(&config.url).await?),
    };
    Ok(pool)
}

/// In-memory SQLite pool for tests
pub async fn create_test_pool() -> Result<DynDatabasePool> {
    create_pool(&DatabaseConfig {
        driver: DatabaseDriver::Sqlite,
        url: ":memory:".to_string(),
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlite_target_parsing() {
        assert_eq!(sqlite_target(":memory:"), SqliteTarget::Memory);
        assert_eq!(sqlite_target("sqlite::memory:"), SqliteTarget::Memory);
        assert_eq!(
            sqlite_target("data/site.db"),
            SqliteTarget::File {
                url: "sqlite:data/site.db?mode=rwc".to_string(),
                path: "data/site.db".to_string(),
            }
        );
        assert_eq!(
            sqlite_target("sqlite:data/site.db?mode=ro"),
            SqliteTarget::File {
                url: "sqlite:data/site.db?mode=ro".to_string(),
                path: "data/site.db".to_string(),
            }
        );
    }

    #[test]
    fn test_mysql_url_prefix() {
        assert_eq!(mysql_url("root@db/site"), "mysql://root@db/site");
        assert_eq!(mysql_url("mysql://root@db/site"), "mysql://root@db/site");
    }

    #[tokio::test]
    async fn test_memory_pool_keeps_schema() {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        assert_eq!(pool.driver(), DatabaseDriver::Sqlite);
        assert!(pool.as_mysql().is_none());

        pool.execute("CREATE TABLE kept (id INTEGER PRIMARY KEY)").await.unwrap();
        assert_eq!(pool.execute("INSERT INTO kept (id) VALUES (1)").await.unwrap(), 1);
        pool.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_file_pool_creates_directories() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let db_path = dir.path().join("nested").join("site.db");
        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Sqlite,
            url: db_path.to_string_lossy().to_string(),
        })
        .await
        .expect("Failed to create pool");

        pool.ping().await.unwrap();
        assert!(db_path.exists());
    }

    #[tokio::test]
    async fn test_foreign_keys_enforced() {
        let pool = create_test_pool().await.unwrap();
        pool.execute("CREATE TABLE parent (id INTEGER PRIMARY KEY)").await.unwrap();
        pool.execute(
            "CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER NOT NULL REFERENCES parent(id))",
        )
        .await
        .unwrap();

        assert!(pool.execute("INSERT INTO child (parent_id) VALUES (42)").await.is_err());
    }

    #[tokio::test]
    async fn test_closed_pool_fails_ping() {
        let pool = create_test_pool().await.unwrap();
        pool.close().await;
        assert!(pool.ping().await.is_err());
    }

    #[tokio::test]
    #[ignore = "Requires MySQL server"]
    async fn test_mysql_pool() {
        let url = std::env::var("MYSQL_TEST_URL")
            .unwrap_or_else(|_| "mysql://root@localhost/test".to_string());
        let pool = create_pool(&DatabaseConfig {
            driver: DatabaseDriver::Mysql,
            url,
        })
        .await
        .expect("Failed to create pool");
        assert_eq!(pool.driver(), DatabaseDriver::Mysql);
        pool.ping().await.unwrap();
    }
}
