//! Project registry

use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::{Error, Result};
use crate::models::Project;
use crate::utils::db_timestamp;

/// Storage layer for projects
#[derive(Clone)]
pub struct ProjectStore {
    pool: SqlitePool,
}

impl ProjectStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a project for a site
    pub async fn create(&self, name: &str, site_url: &str) -> Result<Project> {
        let name = name.trim();
        let site_url = site_url.trim();
        if name.is_empty() {
            return Err(Error::validation("project name must not be empty"));
        }
        if site_url.is_empty() {
            return Err(Error::validation("site url must not be empty"));
        }

        let project = Project {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            site_url: site_url.to_string(),
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            "INSERT INTO projects (id, name, site_url, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&project.id)
        .bind(&project.name)
        .bind(&project.site_url)
        .bind(db_timestamp(&project.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(project),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
                Error::validation(format!("project {} already exists", name)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Look a project up by id or by name
    pub async fn find(&self, id_or_name: &str) -> Result<Project> {
        sqlx::query_as::<_, Project>(
            "SELECT id, name, site_url, created_at FROM projects WHERE id = ? OR name = ? LIMIT 1",
        )
        .bind(id_or_name)
        .bind(id_or_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::not_found(format!("project {}", id_or_name)))
    }

    /// All projects, oldest first
    pub async fn list(&self) -> Result<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            "SELECT id, name, site_url, created_at FROM projects ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }
}
