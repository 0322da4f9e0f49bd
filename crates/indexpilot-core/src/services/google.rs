//! Google indexing provider
//!
//! Implements [`IndexingProvider`] on top of two Google APIs:
//!
//! - **Indexing API** (`urlNotifications:publish`) for submit
//! - **Search Console URL Inspection API** (`index:inspect`) for inspect
//!
//! Quota exhaustion is reported by both APIs as HTTP 429 with an error
//! status of `RESOURCE_EXHAUSTED`; either signal is enough.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};

use super::provider::{IndexingProvider, ProviderError, SubmitReceipt};
use crate::auth::AccessToken;
use crate::models::{ChangeType, InspectionRecord};

// ============================================================================
// Constants
// ============================================================================

/// Indexing API publish endpoint
const PUBLISH_API_URL: &str = "https://indexing.googleapis.com/v3/urlNotifications:publish";

/// URL Inspection API endpoint
const INSPECT_API_URL: &str = "https://searchconsole.googleapis.com/v1/urlInspection/index:inspect";

/// Error status Google uses for quota and rate limits
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct PublishRequest<'a> {
    url: &'a str,
    #[serde(rename = "type")]
    change_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InspectRequest<'a> {
    inspection_url: &'a str,
    site_url: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectResponse {
    inspection_result: Option<InspectionResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InspectionResult {
    index_status_result: Option<IndexStatusResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IndexStatusResult {
    verdict: Option<String>,
    coverage_state: Option<String>,
    indexing_state: Option<String>,
    page_fetch_state: Option<String>,
    crawled_as: Option<String>,
    last_crawl_time: Option<String>,
    #[serde(default)]
    referring_urls: Vec<String>,
    #[serde(default)]
    sitemap: Vec<String>,
}

impl From<IndexStatusResult> for InspectionRecord {
    fn from(r: IndexStatusResult) -> Self {
        Self {
            verdict: r.verdict,
            coverage_state: r.coverage_state,
            indexing_state: r.indexing_state,
            page_fetch_state: r.page_fetch_state,
            crawled_as: r.crawled_as,
            last_crawl_time: r.last_crawl_time,
            referring_urls: r.referring_urls,
            sitemaps: r.sitemap,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

// ============================================================================
// Classification
// ============================================================================

/// Turn a non-success HTTP answer into a [`ProviderError`]
pub fn classify_error(code: u16, body: &str) -> ProviderError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error);

    let status = parsed.as_ref().and_then(|e| e.status.clone());
    let message = parsed
        .and_then(|e| e.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let snippet: String = body.chars().take(200).collect();
            if snippet.trim().is_empty() {
                format!("HTTP {}", code)
            } else {
                snippet
            }
        });

    if code == 429 || status.as_deref() == Some(RESOURCE_EXHAUSTED) {
        ProviderError::QuotaExhausted { code, message }
    } else {
        ProviderError::Api { code, message }
    }
}

// ============================================================================
// Client
// ============================================================================

/// Google Indexing API + URL Inspection API client
pub struct GoogleIndexingClient {
    client: Client,
    publish_url: String,
    inspect_url: String,
}

impl GoogleIndexingClient {
    /// Create a client with the given per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    /// Wrap an existing HTTP client
    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            publish_url: PUBLISH_API_URL.to_string(),
            inspect_url: INSPECT_API_URL.to_string(),
        }
    }

    /// Point the client at different endpoints (staging, local proxies)
    pub fn with_endpoints(mut self, publish_url: impl Into<String>, inspect_url: impl Into<String>) -> Self {
        self.publish_url = publish_url.into();
        self.inspect_url = inspect_url.into();
        self
    }

    async fn read_error(response: Response) -> ProviderError {
        let code = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        classify_error(code, &body)
    }
}

#[async_trait]
impl IndexingProvider for GoogleIndexingClient {
    fn provider_id(&self) -> &'static str {
        "google"
    }

    async fn submit(
        &self,
        token: &AccessToken,
        url: &str,
        change_type: ChangeType,
    ) -> Result<SubmitReceipt, ProviderError> {
        log::debug!("[google] publish {} {}", change_type, url);

        let response = self
            .client
            .post(&self.publish_url)
            .bearer_auth(token.secret())
            .json(&PublishRequest {
                url,
                change_type: change_type.as_str(),
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        Ok(SubmitReceipt {
            status_code: response.status().as_u16(),
        })
    }

    async fn inspect(
        &self,
        token: &AccessToken,
        url: &str,
        site_url: &str,
    ) -> Result<InspectionRecord, ProviderError> {
        log::debug!("[google] inspect {} in {}", url, site_url);

        let response = self
            .client
            .post(&self.inspect_url)
            .bearer_auth(token.secret())
            .json(&InspectRequest {
                inspection_url: url,
                site_url,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_error(response).await);
        }

        let body = response.text().await?;
        parse_inspection(&body)
    }
}

/// Parse an `index:inspect` success body
pub fn parse_inspection(body: &str) -> Result<InspectionRecord, ProviderError> {
    let parsed: InspectResponse = serde_json::from_str(body)?;
    let status = parsed
        .inspection_result
        .and_then(|r| r.index_status_result)
        .ok_or_else(|| ProviderError::Parse("response has no indexStatusResult".to_string()))?;
    Ok(status.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_429_as_quota() {
        let body = r#"{"error": {"code": 429, "message": "Quota exceeded for quota metric 'Publish requests'", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = classify_error(429, body);
        assert_eq!(
            err,
            ProviderError::QuotaExhausted {
                code: 429,
                message: "Quota exceeded for quota metric 'Publish requests'".to_string(),
            }
        );
    }

    #[test]
    fn test_classify_resource_exhausted_status_without_429() {
        let body = r#"{"error": {"code": 403, "message": "Daily limit reached", "status": "RESOURCE_EXHAUSTED"}}"#;
        assert!(classify_error(403, body).is_quota_exhausted());
    }

    #[test]
    fn test_classify_permission_denied() {
        let body = r#"{"error": {"code": 403, "message": "Permission denied. Failed to verify the URL ownership.", "status": "PERMISSION_DENIED"}}"#;
        let err = classify_error(403, body);
        assert!(!err.is_quota_exhausted());
        assert_eq!(err.status_code(), Some(403));
        assert_eq!(err.reason(), "Permission denied. Failed to verify the URL ownership.");
    }

    #[test]
    fn test_classify_non_json_body() {
        let err = classify_error(502, "");
        assert_eq!(
            err,
            ProviderError::Api {
                code: 502,
                message: "HTTP 502".to_string()
            }
        );
        let err = classify_error(500, "<html>Server Error</html>");
        assert_eq!(err.reason(), "<html>Server Error</html>");
    }

    #[test]
    fn test_parse_inspection() {
        let body = r#"{
            "inspectionResult": {
                "inspectionResultLink": "https://search.google.com/search-console/inspect?resource_id=x",
                "indexStatusResult": {
                    "verdict": "PASS",
                    "coverageState": "Submitted and indexed",
                    "robotsTxtState": "ALLOWED",
                    "indexingState": "INDEXING_ALLOWED",
                    "lastCrawlTime": "2026-09-30T04:12:55Z",
                    "pageFetchState": "SUCCESSFUL",
                    "crawledAs": "MOBILE",
                    "referringUrls": ["https://example.com/"],
                    "sitemap": ["https://example.com/sitemap.xml"]
                }
            }
        }"#;
        let record = parse_inspection(body).unwrap();
        assert_eq!(record.verdict.as_deref(), Some("PASS"));
        assert_eq!(record.coverage_state.as_deref(), Some("Submitted and indexed"));
        assert_eq!(record.crawled_as.as_deref(), Some("MOBILE"));
        assert_eq!(record.referring_urls, vec!["https://example.com/".to_string()]);
        assert_eq!(record.sitemaps, vec!["https://example.com/sitemap.xml".to_string()]);
    }

    #[test]
    fn test_parse_inspection_unknown_url() {
        let body = r#"{"inspectionResult": {"indexStatusResult": {"verdict": "NEUTRAL", "coverageState": "URL is unknown to Google"}}}"#;
        let record = parse_inspection(body).unwrap();
        assert_eq!(record.verdict.as_deref(), Some("NEUTRAL"));
        assert!(record.referring_urls.is_empty());
        assert!(record.last_crawl_time.is_none());
    }

    #[test]
    fn test_parse_inspection_missing_result() {
        let err = parse_inspection(r#"{"inspectionResult": {}}"#).unwrap_err();
        assert!(matches!(err, ProviderError::Parse(_)));
    }

    #[test]
    fn test_publish_request_shape() {
        let json = serde_json::to_value(PublishRequest {
            url: "https://example.com/a",
            change_type: ChangeType::UrlDeleted.as_str(),
        })
        .unwrap();
        assert_eq!(json["type"], "URL_DELETED");
        assert_eq!(json["url"], "https://example.com/a");
    }
}
