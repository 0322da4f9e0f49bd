//! Credential pool
//!
//! Enumerates the service-account credentials registered for a project
//! (oldest first, the oldest being the primary) and turns them into
//! operation-scoped bearer tokens for one dispatch run.
//!
//! A credential that cannot be authorized is dropped for the rest of the
//! run; the run only fails when no credential is left.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use sqlx::SqlitePool;

use crate::auth::{self, AccessToken, TokenScope};
use crate::error::{Error, Result};
use crate::models::{Credential, ServiceAccountKey};
use crate::utils::db_timestamp;

// ============================================================================
// Token Source
// ============================================================================

/// Mints a bearer token for one credential and scope
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Exchange the credential's key material for a short-lived token
    ///
    /// # Errors
    ///
    /// Returns `Error::Auth` for malformed keys, network failures and
    /// provider rejections alike.
    async fn authorize(&self, credential: &Credential, scope: TokenScope) -> Result<AccessToken>;
}

/// [`TokenSource`] using the OAuth 2.0 JWT-bearer grant
pub struct ServiceAccountTokenSource {
    client: Client,
}

impl ServiceAccountTokenSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl TokenSource for ServiceAccountTokenSource {
    async fn authorize(&self, credential: &Credential, scope: TokenScope) -> Result<AccessToken> {
        auth::exchange_token(&self.client, credential, scope).await
    }
}

/// A credential together with the token minted for the current run
#[derive(Debug, Clone)]
pub struct AuthorizedCredential {
    pub credential: Credential,
    pub token: AccessToken,
}

impl AuthorizedCredential {
    /// Stable identifier recorded on outcomes
    pub fn id(&self) -> &str {
        &self.credential.client_email
    }
}

/// Authorize every credential for `scope`, dropping the ones that fail.
///
/// Pool order is preserved. Fails with `Error::NotConfigured` when
/// `credentials` is empty and with `Error::Auth` when every credential was
/// rejected.
pub async fn authorize_all(
    source: &dyn TokenSource,
    credentials: Vec<Credential>,
    scope: TokenScope,
) -> Result<Vec<AuthorizedCredential>> {
    if credentials.is_empty() {
        return Err(Error::not_configured("no credential available for this project"));
    }

    let total = credentials.len();
    let mut authorized = Vec::with_capacity(total);
    let mut last_error = None;

    for credential in credentials {
        match source.authorize(&credential, scope).await {
            Ok(token) => authorized.push(AuthorizedCredential { credential, token }),
            Err(e) => {
                log::warn!(
                    "[credentials] Dropping {} for this run: {}",
                    credential.client_email,
                    e
                );
                last_error = Some(e.to_string());
            }
        }
    }

    if authorized.is_empty() {
        return Err(Error::auth(format!(
            "none of {} credential(s) could be authorized; last error: {}",
            total,
            last_error.unwrap_or_default()
        )));
    }

    log::info!(
        "[credentials] {} of {} credential(s) authorized for {:?}",
        authorized.len(),
        total,
        scope
    );

    Ok(authorized)
}

// ============================================================================
// CredentialPool
// ============================================================================

/// Storage-backed pool of credentials per project
#[derive(Clone)]
pub struct CredentialPool {
    pool: SqlitePool,
}

impl CredentialPool {
    /// Create a new CredentialPool with the given database pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// All credentials of a project, oldest first
    ///
    /// # Errors
    /// Returns `Error::NotConfigured` if the project has none.
    pub async fn list(&self, project_id: &str) -> Result<Vec<Credential>> {
        let credentials = self.registered(project_id).await?;
        if credentials.is_empty() {
            return Err(Error::not_configured(format!(
                "project {} has no credential; add one with `indexpilot credential add`",
                project_id
            )));
        }
        Ok(credentials)
    }

    /// All credentials of a project, oldest first (possibly none)
    pub async fn registered(&self, project_id: &str) -> Result<Vec<Credential>> {
        let rows = sqlx::query_as::<_, Credential>(
            r#"
            SELECT id, project_id, client_email, private_key, token_uri, site_url, created_at
            FROM credentials
            WHERE project_id = ?
            ORDER BY created_at ASC, rowid ASC
            "#,
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Register a credential for a project
    pub async fn add(
        &self,
        project_id: &str,
        key: &ServiceAccountKey,
        site_url: Option<&str>,
    ) -> Result<Credential> {
        let credential = Credential {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            client_email: key.client_email.clone(),
            private_key: key.private_key.clone(),
            token_uri: key.token_uri.clone(),
            site_url: site_url.map(str::to_string),
            created_at: Utc::now(),
        };

        let result = sqlx::query(
            r#"
            INSERT INTO credentials
            (id, project_id, client_email, private_key, token_uri, site_url, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&credential.id)
        .bind(&credential.project_id)
        .bind(&credential.client_email)
        .bind(&credential.private_key)
        .bind(&credential.token_uri)
        .bind(&credential.site_url)
        .bind(db_timestamp(&credential.created_at))
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(Error::validation(format!(
                    "{} is already registered for this project",
                    key.client_email
                )));
            }
            Err(e) => return Err(e.into()),
        }

        log::info!(
            "[credentials] Registered {} for project {}",
            credential.client_email,
            project_id
        );

        Ok(credential)
    }

    /// Register a credential from a service-account key JSON file
    ///
    /// The private key is checked to be a usable RSA PEM before storing.
    pub async fn add_from_file(
        &self,
        project_id: &str,
        path: &Path,
        site_url: Option<&str>,
    ) -> Result<Credential> {
        let raw = std::fs::read_to_string(path)?;
        let key: ServiceAccountKey = serde_json::from_str(&raw)?;

        if key.client_email.trim().is_empty() {
            return Err(Error::validation("key file has an empty client_email"));
        }
        jsonwebtoken::EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            Error::validation(format!("key file has an unusable private_key: {}", e))
        })?;

        self.add(project_id, &key, site_url).await
    }

    /// Remove a credential by its client email
    ///
    /// Returns whether a row was deleted.
    pub async fn remove(&self, project_id: &str, client_email: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM credentials WHERE project_id = ? AND client_email = ?")
            .bind(project_id)
            .bind(client_email)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
