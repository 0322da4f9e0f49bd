//! Data models for indexpilot
//!
//! Row types (`*Row`) map directly onto the SQLite schema and keep enum
//! columns as plain text; they are converted into the typed models below
//! at the store boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ============================================================================
// Projects & Credentials
// ============================================================================

/// A site owner's project; everything else is scoped by `project.id`
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: String,
    pub name: String,
    /// Default site identifier for inspect calls (`sc-domain:example.com`
    /// or a URL-prefix property like `https://example.com/`)
    pub site_url: String,
    pub created_at: DateTime<Utc>,
}

/// Service-account credential able to call the indexing APIs for a site
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Credential {
    pub id: String,
    pub project_id: String,
    /// Stable identifier (service account email)
    pub client_email: String,
    /// PEM-encoded RSA private key
    pub private_key: String,
    pub token_uri: String,
    /// Site this credential is verified for, if different from the project's
    pub site_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Credential {
    /// Site identifier to use for inspect calls made with this credential
    pub fn site_or<'a>(&'a self, project_site: &'a str) -> &'a str {
        self.site_url.as_deref().unwrap_or(project_site)
    }
}

/// Credential listing (without key material)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialResponse {
    pub id: String,
    pub project_id: String,
    pub client_email: String,
    pub site_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Credential> for CredentialResponse {
    fn from(cred: Credential) -> Self {
        Self {
            id: cred.id,
            project_id: cred.project_id,
            client_email: cred.client_email,
            site_url: cred.site_url,
            created_at: cred.created_at,
        }
    }
}

/// Google service-account key file (the subset we read)
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

// ============================================================================
// Enums
// ============================================================================

/// External operation a dispatch run performs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Crawl-priority notification
    Submit,
    /// Read-only index status lookup
    Inspect,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Submit => write!(f, "submit"),
            Operation::Inspect => write!(f, "inspect"),
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "submit" => Ok(Operation::Submit),
            "inspect" => Ok(Operation::Inspect),
            _ => Err(format!("Unknown operation: {}", s)),
        }
    }
}

/// Notification type sent with a submit call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeType {
    #[default]
    UrlUpdated,
    UrlDeleted,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::UrlUpdated => "URL_UPDATED",
            ChangeType::UrlDeleted => "URL_DELETED",
        }
    }
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChangeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "URL_UPDATED" | "UPDATED" | "UPDATE" => Ok(ChangeType::UrlUpdated),
            "URL_DELETED" | "DELETED" | "DELETE" => Ok(ChangeType::UrlDeleted),
            _ => Err(format!("Unknown change type: {}", s)),
        }
    }
}

/// Result status of one external call attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Success,
    Failed,
    QuotaExhausted,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::QuotaExhausted => "quota_exhausted",
        }
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OutcomeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(OutcomeStatus::Success),
            "failed" => Ok(OutcomeStatus::Failed),
            "quota_exhausted" | "exhausted" => Ok(OutcomeStatus::QuotaExhausted),
            _ => Err(format!("Unknown outcome status: {}", s)),
        }
    }
}

// ============================================================================
// Outcomes
// ============================================================================

/// Persisted result of one external call attempt for one URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub id: String,
    pub project_id: String,
    pub url: String,
    pub operation: Operation,
    pub change_type: Option<ChangeType>,
    /// Client email of the credential that made the final call
    pub credential_id: Option<String>,
    pub status: OutcomeStatus,
    pub reason: Option<String>,
    pub response_code: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DispatchOutcome {
    /// Create a new outcome stamped with the current time
    pub fn new(
        project_id: impl Into<String>,
        url: impl Into<String>,
        operation: Operation,
        status: OutcomeStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            url: url.into(),
            operation,
            change_type: None,
            credential_id: None,
            status,
            reason: None,
            response_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_change_type(mut self, change_type: Option<ChangeType>) -> Self {
        self.change_type = change_type;
        self
    }

    pub fn with_credential(mut self, credential_id: impl Into<String>) -> Self {
        self.credential_id = Some(credential_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_response_code(mut self, code: u16) -> Self {
        self.response_code = Some(i64::from(code));
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self.updated_at = at;
        self
    }
}

/// Database row representation of an outcome (`indexing_requests` table)
#[derive(Debug, Clone, FromRow)]
pub struct OutcomeRow {
    pub id: String,
    pub project_id: String,
    pub url: String,
    pub operation: String,
    pub change_type: Option<String>,
    pub credential_id: Option<String>,
    pub status: String,
    pub reason: Option<String>,
    pub response_code: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OutcomeRow {
    /// Convert database row to a typed outcome
    ///
    /// Returns `None` if an enum column holds an unknown value.
    pub fn to_outcome(&self) -> Option<DispatchOutcome> {
        let operation = self.operation.parse::<Operation>().ok()?;
        let status = self.status.parse::<OutcomeStatus>().ok()?;
        let change_type = match &self.change_type {
            Some(ct) => Some(ct.parse::<ChangeType>().ok()?),
            None => None,
        };

        Some(DispatchOutcome {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
            url: self.url.clone(),
            operation,
            change_type,
            credential_id: self.credential_id.clone(),
            status,
            reason: self.reason.clone(),
            response_code: self.response_code,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

// ============================================================================
// Inspection & Inventory
// ============================================================================

/// Index status reported by the URL inspection API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectionRecord {
    pub verdict: Option<String>,
    pub coverage_state: Option<String>,
    pub indexing_state: Option<String>,
    pub page_fetch_state: Option<String>,
    pub crawled_as: Option<String>,
    pub last_crawl_time: Option<String>,
    pub referring_urls: Vec<String>,
    pub sitemaps: Vec<String>,
}

/// Stored inspection result for one (project, url)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredInspection {
    pub project_id: String,
    pub url: String,
    #[serde(flatten)]
    pub record: InspectionRecord,
    pub inspected_at: DateTime<Utc>,
}

/// Read-side projection: a known URL joined with its latest outcome and
/// inspection result
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InventoryItem {
    pub url: String,
    pub added_at: DateTime<Utc>,
    pub last_operation: Option<String>,
    pub last_status: Option<String>,
    pub last_reason: Option<String>,
    pub last_credential: Option<String>,
    pub last_attempt_at: Option<DateTime<Utc>>,
    pub verdict: Option<String>,
    pub coverage_state: Option<String>,
    pub indexing_state: Option<String>,
    pub last_crawl_time: Option<String>,
    pub inspected_at: Option<DateTime<Utc>>,
}
