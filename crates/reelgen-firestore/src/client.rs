//! Firestore REST API client.
//!
//! Read-only document access with:
//! - Service account auth through a shared token cache
//! - Emulator/test mode without auth (`FIRESTORE_EMULATOR_HOST`, `FIRESTORE_BASE_URL`)
//! - Retry with backoff on transient failures
//! - Tracing spans and request metrics

use std::sync::Arc;
use std::time::{Duration, Instant};

use gcp_auth::{CustomServiceAccount, TokenProvider};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, info_span, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::token_cache::TokenCache;
use crate::types::Document;

const DEFAULT_ENDPOINT: &str = "https://firestore.googleapis.com";

// =============================================================================
// Configuration
// =============================================================================

/// Firestore client configuration.
#[derive(Debug, Clone)]
pub struct FirestoreConfig {
    /// GCP project ID
    pub project_id: String,
    /// Database ID (usually "(default)")
    pub database_id: String,
    /// Endpoint override. When set, requests are sent unauthenticated.
    pub endpoint: Option<String>,
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub retry: RetryConfig,
}

impl FirestoreConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: "(default)".to_string(),
            endpoint: None,
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Create config from environment variables.
    pub fn from_env() -> FirestoreResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID")
            .or_else(|_| std::env::var("FIREBASE_PROJECT_ID"))
            .map_err(|_| {
                FirestoreError::config_error(
                    "GCP_PROJECT_ID or FIREBASE_PROJECT_ID must be set to access Firestore",
                )
            })?;

        if project_id.trim().is_empty() {
            return Err(FirestoreError::config_error(
                "GCP_PROJECT_ID or FIREBASE_PROJECT_ID cannot be empty",
            ));
        }

        let endpoint = std::env::var("FIRESTORE_BASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                std::env::var("FIRESTORE_EMULATOR_HOST")
                    .ok()
                    .filter(|s| !s.trim().is_empty())
                    .map(|host| format!("http://{}", host.trim()))
            });

        let timeout_secs: u64 = std::env::var("FIRESTORE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);
        let connect_timeout_secs: u64 = std::env::var("FIRESTORE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            project_id,
            database_id: std::env::var("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|_| "(default)".to_string()),
            endpoint,
            timeout: Duration::from_secs(timeout_secs),
            connect_timeout: Duration::from_secs(connect_timeout_secs),
            retry: RetryConfig::from_env(),
        })
    }
}

// =============================================================================
// Client
// =============================================================================

/// Firestore REST API client.
#[derive(Clone)]
pub struct FirestoreClient {
    http: Client,
    config: FirestoreConfig,
    documents_url: String,
    /// `None` in emulator mode.
    token_cache: Option<Arc<TokenCache>>,
}

impl FirestoreClient {
    /// Create a new Firestore client.
    pub async fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let token_cache = match config.endpoint {
            Some(_) => None,
            None => Some(Arc::new(TokenCache::new(Self::create_auth_provider()?))),
        };

        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("reelgen-firestore/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FirestoreError::Network)?;

        let endpoint = config
            .endpoint
            .as_deref()
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/');
        let documents_url = format!(
            "{}/v1/projects/{}/databases/{}/documents",
            endpoint, config.project_id, config.database_id
        );

        Ok(Self {
            http,
            config,
            documents_url,
            token_cache,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> FirestoreResult<Self> {
        Self::new(FirestoreConfig::from_env()?).await
    }

    fn create_auth_provider() -> FirestoreResult<Arc<dyn TokenProvider>> {
        let service_account = CustomServiceAccount::from_env().map_err(|e| {
            FirestoreError::auth_error(format!("Failed to load service account: {}", e))
        })?;

        match service_account {
            Some(sa) => Ok(Arc::new(sa)),
            None => Err(FirestoreError::auth_error(
                "GOOGLE_APPLICATION_CREDENTIALS not set. \
                 Set it to the path of your service account JSON file.",
            )),
        }
    }

    pub fn config(&self) -> &FirestoreConfig {
        &self.config
    }

    fn document_url(&self, collection: &str, doc_id: &str) -> String {
        format!(
            "{}/{}/{}",
            self.documents_url,
            collection,
            urlencoding::encode(doc_id)
        )
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    /// Fetch a document. `Ok(None)` when it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        doc_id: &str,
    ) -> FirestoreResult<Option<Document>> {
        let url = self.document_url(collection, doc_id);
        let span = info_span!(
            "firestore_request",
            operation = "get_document",
            collection = %collection,
            doc_id = %doc_id
        );

        let start = Instant::now();
        let target = url.as_str();
        let result = with_retry(&self.config.retry, "get_document", move || {
            self.fetch_once(target)
        })
        .instrument(span)
        .await;

        let status = match &result {
            Ok(Some(_)) => 200,
            Ok(None) => 404,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request("get_document", status, start.elapsed());

        result
    }

    async fn fetch_once(&self, url: &str) -> FirestoreResult<Option<Document>> {
        let mut response = self.send_get(url).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            match &self.token_cache {
                Some(cache) if Self::is_access_token_expired(&body) => {
                    debug!("Access token rejected as expired, refreshing");
                    cache.invalidate().await;
                    response = self.send_get(url).await?;
                }
                _ => {
                    return Err(FirestoreError::from_http_status(
                        401,
                        format!("{} failed: {}", url, body),
                    ))
                }
            }
        }

        match response.status() {
            StatusCode::OK => Ok(Some(response.json::<Document>().await?)),
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(Self::error_from_response(status, url, response).await),
        }
    }

    async fn send_get(&self, url: &str) -> FirestoreResult<Response> {
        let request = self.http.get(url);
        let request = match &self.token_cache {
            Some(cache) => request.bearer_auth(cache.get_token().await?),
            None => request,
        };
        Ok(request.send().await?)
    }

    async fn error_from_response(status: StatusCode, url: &str, response: Response) -> FirestoreError {
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body = response.text().await.unwrap_or_default();

        match (status, retry_after_ms) {
            (StatusCode::TOO_MANY_REQUESTS, Some(ms)) => FirestoreError::RateLimited(ms),
            _ => FirestoreError::from_http_status(status.as_u16(), format!("{} failed: {}", url, body)),
        }
    }
}
