//! Database module - SQLx with SQLite

use crate::error::{Error, Result};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::PathBuf;

/// Environment variable overriding the database location
pub const ENV_DB_PATH: &str = "INDEXPILOT_DB_PATH";

/// Database state
#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    /// Create a new database connection with default path
    pub async fn new() -> Result<Self> {
        let db_path = get_db_path()?;
        Self::open(db_path).await
    }

    /// Create a new database connection with a specific path
    pub async fn open(db_path: PathBuf) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());
        log::info!("Connecting to database: {}", db_path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    /// Run database migrations
    async fn run_migrations(&self) -> Result<()> {
        log::info!("Running database migrations...");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                site_url TEXT NOT NULL,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Service-account credentials, oldest first is the primary
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                client_email TEXT NOT NULL,
                private_key TEXT NOT NULL,
                token_uri TEXT NOT NULL,
                site_url TEXT,
                created_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id),
                UNIQUE(project_id, client_email)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_credentials_project ON credentials(project_id, created_at)",
        )
        .execute(&self.pool)
        .await?;

        // Append-mostly outcome log: one row per (project, url, attempt)
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS indexing_requests (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                url TEXT NOT NULL,
                operation TEXT NOT NULL,
                change_type TEXT,
                credential_id TEXT,
                status TEXT NOT NULL,
                reason TEXT,
                response_code INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (project_id) REFERENCES projects(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Serves the "most recent row per url" window query
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_requests_project_url_created ON indexing_requests(project_id, url, created_at)",
        )
        .execute(&self.pool)
        .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_requests_project_status ON indexing_requests(project_id, status)",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS url_inspections (
                project_id TEXT NOT NULL,
                url TEXT NOT NULL,
                verdict TEXT,
                coverage_state TEXT,
                indexing_state TEXT,
                page_fetch_state TEXT,
                crawled_as TEXT,
                last_crawl_time TEXT,
                referring_urls TEXT,
                sitemaps TEXT,
                inspected_at TEXT NOT NULL,
                PRIMARY KEY (project_id, url),
                FOREIGN KEY (project_id) REFERENCES projects(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS known_urls (
                project_id TEXT NOT NULL,
                url TEXT NOT NULL,
                added_at TEXT NOT NULL,
                PRIMARY KEY (project_id, url),
                FOREIGN KEY (project_id) REFERENCES projects(id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        log::info!("Database migrations completed");
        Ok(())
    }
}

/// Get database file path
/// Priority: INDEXPILOT_DB_PATH env var > default app data directory
pub fn get_db_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(ENV_DB_PATH) {
        let expanded = shellexpand::tilde(&path).into_owned();
        return Ok(PathBuf::from(expanded));
    }

    let dirs = directories::ProjectDirs::from("com", "indexpilot", "IndexPilot")
        .ok_or_else(|| Error::config("Could not determine project directories"))?;

    Ok(dirs.data_dir().join("indexpilot.db"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Mutex to ensure env var tests don't run in parallel
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn test_get_db_path_default() {
        let _lock = ENV_MUTEX.lock().unwrap();
        std::env::remove_var(ENV_DB_PATH);
        let path = get_db_path().unwrap();
        assert!(path.to_string_lossy().contains("indexpilot.db"));
    }

    #[test]
    fn test_get_db_path_env_override() {
        let _lock = ENV_MUTEX.lock().unwrap();
        let test_path = "/tmp/test_indexpilot.db";
        std::env::set_var(ENV_DB_PATH, test_path);
        let path = get_db_path().unwrap();
        assert_eq!(path.to_string_lossy(), test_path);
        std::env::remove_var(ENV_DB_PATH);
    }

    #[tokio::test]
    async fn test_open_runs_migrations_idempotently() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("test.db");

        let db = Database::open(path.clone()).await.unwrap();
        drop(db);
        let db = Database::open(path).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name",
        )
        .fetch_all(&db.pool)
        .await
        .unwrap();
        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        for expected in [
            "credentials",
            "indexing_requests",
            "known_urls",
            "projects",
            "url_inspections",
        ] {
            assert!(names.contains(&expected), "missing table {}", expected);
        }
    }
}
