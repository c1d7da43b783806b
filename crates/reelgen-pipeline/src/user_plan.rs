//! Plan/usage store for watermark gating.
//!
//! Lookups are read-only and return the user's current plan record.
//! `Ok(None)` means the user has no usage record at all; callers decide what
//! that implies.

use async_trait::async_trait;
use reelgen_firestore::{FirestoreClient, FirestoreError};
use reelgen_models::PlanRecord;
use thiserror::Error;
use tracing::debug;

/// Document fields holding the plan id, in lookup order.
pub const PLAN_FIELDS: &[&str] = &["plan_id", "plan_tier", "plan"];

/// Default collection of per-user usage documents.
pub const DEFAULT_PLAN_COLLECTION: &str = "users";

#[derive(Debug, Error)]
pub enum PlanStoreError {
    #[error("Plan store unavailable: {0}")]
    Unavailable(String),

    #[error("Firestore error: {0}")]
    Firestore(#[from] FirestoreError),
}

/// Read access to users' current plans.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PlanStore: Send + Sync {
    async fn get_current_plan(&self, user_id: &str) -> Result<Option<PlanRecord>, PlanStoreError>;
}

/// Plan store backed by one Firestore document per user.
pub struct FirestorePlanStore {
    client: FirestoreClient,
    collection: String,
}

impl FirestorePlanStore {
    pub fn new(client: FirestoreClient, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    /// Build from `GCP_PROJECT_ID`/`FIRESTORE_*` and `PLAN_COLLECTION`.
    pub async fn from_env() -> Result<Self, PlanStoreError> {
        let client = FirestoreClient::from_env().await?;
        let collection = std::env::var("PLAN_COLLECTION")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PLAN_COLLECTION.to_string());
        Ok(Self::new(client, collection))
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }
}

#[async_trait]
impl PlanStore for FirestorePlanStore {
    async fn get_current_plan(&self, user_id: &str) -> Result<Option<PlanRecord>, PlanStoreError> {
        let Some(doc) = self.client.get_document(&self.collection, user_id).await? else {
            debug!(user_id = %user_id, "No usage record for user");
            return Ok(None);
        };

        let plan_id = doc.first_string(PLAN_FIELDS).unwrap_or_default();
        debug!(user_id = %user_id, plan_id = %plan_id, "Resolved current plan");
        Ok(Some(PlanRecord::new(plan_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reelgen_firestore::{FirestoreConfig, RetryConfig};
    use serde_json::json;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store_for(server: &MockServer) -> FirestorePlanStore {
        let config = FirestoreConfig::new("test-project")
            .with_endpoint(server.uri())
            .with_retry(RetryConfig {
                max_retries: 0,
                base_delay_ms: 1,
                max_delay_ms: 1,
            });
        let client = FirestoreClient::new(config).await.unwrap();
        FirestorePlanStore::new(client, "users")
    }

    #[tokio::test]
    async fn test_reads_plan_id_field_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"/documents/users/uid-1$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fields": {
                    "plan_id": {"stringValue": "pro_monthly"},
                    "plan": {"stringValue": "free"}
                }
            })))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let record = store.get_current_plan("uid-1").await.unwrap();
        assert_eq!(record, Some(PlanRecord::new("pro_monthly")));
    }

    #[tokio::test]
    async fn test_falls_back_to_legacy_plan_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fields": {"plan_tier": {"stringValue": "studio"}}
            })))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let record = store.get_current_plan("uid-2").await.unwrap();
        assert_eq!(record, Some(PlanRecord::new("studio")));
    }

    #[tokio::test]
    async fn test_document_without_plan_is_empty_plan() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fields": {"email": {"stringValue": "a@example.com"}}
            })))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let record = store.get_current_plan("uid-3").await.unwrap();
        assert_eq!(record, Some(PlanRecord::new("")));
    }

    #[tokio::test]
    async fn test_missing_document_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        assert_eq!(store.get_current_plan("ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_server_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        assert!(matches!(
            store.get_current_plan("uid-4").await,
            Err(PlanStoreError::Firestore(_))
        ));
    }
}
