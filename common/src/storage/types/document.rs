use state_machines::state_machine;
use surrealdb::sql::Datetime as SurrealDatetime;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

#[derive(Debug, Default, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum DocumentStatus {
    #[serde(rename = "pending")]
    #[default]
    Pending,
    #[serde(rename = "processing")]
    Processing,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
}

impl DocumentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentStatus::Pending => "pending",
            DocumentStatus::Processing => "processing",
            DocumentStatus::Completed => "completed",
            DocumentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DocumentStatus::Completed | DocumentStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy)]
enum StatusTransition {
    Begin,
    Complete,
    Fail,
}

impl StatusTransition {
    fn as_str(&self) -> &'static str {
        match self {
            StatusTransition::Begin => "begin",
            StatusTransition::Complete => "complete",
            StatusTransition::Fail => "fail",
        }
    }
}

mod lifecycle {
    use super::state_machine;

    state_machine! {
        name: DocumentLifecycleMachine,
        initial: Pending,
        states: [Pending, Processing, Completed, Failed],
        events {
            begin {
                transition: { from: Pending, to: Processing }
                transition: { from: Completed, to: Processing }
                transition: { from: Failed, to: Processing }
            }
            complete {
                transition: { from: Processing, to: Completed }
            }
            fail {
                transition: { from: Processing, to: Failed }
            }
        }
    }

    pub(super) fn pending() -> DocumentLifecycleMachine<(), Pending> {
        DocumentLifecycleMachine::new(())
    }

    pub(super) fn processing() -> DocumentLifecycleMachine<(), Processing> {
        pending()
            .begin()
            .expect("begin transition from Pending should exist")
    }

    pub(super) fn completed() -> DocumentLifecycleMachine<(), Completed> {
        processing()
            .complete()
            .expect("complete transition from Processing should exist")
    }

    pub(super) fn failed() -> DocumentLifecycleMachine<(), Failed> {
        processing()
            .fail()
            .expect("fail transition from Processing should exist")
    }
}

fn invalid_transition(status: &DocumentStatus, event: StatusTransition) -> AppError {
    AppError::Validation(format!(
        "Invalid document transition: {} -> {}",
        status.as_str(),
        event.as_str()
    ))
}

fn compute_next_status(
    status: &DocumentStatus,
    event: StatusTransition,
) -> Result<DocumentStatus, AppError> {
    use lifecycle::*;
    match (status, event) {
        (DocumentStatus::Pending, StatusTransition::Begin) => pending()
            .begin()
            .map(|_| DocumentStatus::Processing)
            .map_err(|_| invalid_transition(status, event)),
        (DocumentStatus::Completed, StatusTransition::Begin) => completed()
            .begin()
            .map(|_| DocumentStatus::Processing)
            .map_err(|_| invalid_transition(status, event)),
        (DocumentStatus::Failed, StatusTransition::Begin) => failed()
            .begin()
            .map(|_| DocumentStatus::Processing)
            .map_err(|_| invalid_transition(status, event)),
        (DocumentStatus::Processing, StatusTransition::Complete) => processing()
            .complete()
            .map(|_| DocumentStatus::Completed)
            .map_err(|_| invalid_transition(status, event)),
        (DocumentStatus::Processing, StatusTransition::Fail) => processing()
            .fail()
            .map(|_| DocumentStatus::Failed)
            .map_err(|_| invalid_transition(status, event)),
        _ => Err(invalid_transition(status, event)),
    }
}

stored_object!(Document, "document", {
    merchant_id: String,
    file_name: String,
    file_type: String,
    storage_key: String,
    sha256: String,
    status: DocumentStatus,
    error_message: Option<String>
});

impl Document {
    pub fn new(
        merchant_id: String,
        file_name: String,
        file_type: String,
        storage_key: String,
        sha256: String,
    ) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            merchant_id,
            file_name,
            file_type,
            storage_key,
            sha256,
            status: DocumentStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Compare-and-swap lease on the status field. The claim succeeds from any
    /// state except `processing`, so a redelivered job for a document that is
    /// already in flight observes `None` instead of racing the active run.
    pub async fn try_begin_processing(
        db: &SurrealDbClient,
        id: &str,
    ) -> Result<Option<Document>, AppError> {
        debug_assert!(compute_next_status(&DocumentStatus::Pending, StatusTransition::Begin).is_ok());
        debug_assert!(
            compute_next_status(&DocumentStatus::Completed, StatusTransition::Begin).is_ok()
        );
        debug_assert!(compute_next_status(&DocumentStatus::Failed, StatusTransition::Begin).is_ok());

        const BEGIN_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $processing,
                error_message = NONE,
                updated_at = $now
            WHERE status != $processing
            RETURN *;
        "#;

        let now = chrono::Utc::now();
        let mut result = db
            .client
            .query(BEGIN_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", id.to_string()))
            .bind(("processing", DocumentStatus::Processing.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let document: Option<Document> = result.take(0)?;
        Ok(document)
    }

    pub async fn mark_completed(&self, db: &SurrealDbClient) -> Result<Document, AppError> {
        let next = compute_next_status(&self.status, StatusTransition::Complete)?;
        debug_assert_eq!(next, DocumentStatus::Completed);

        const COMPLETE_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $completed,
                error_message = NONE,
                updated_at = $now
            WHERE status = $processing
            RETURN *;
        "#;

        let now = chrono::Utc::now();
        let mut result = db
            .client
            .query(COMPLETE_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("completed", DocumentStatus::Completed.as_str()))
            .bind(("processing", DocumentStatus::Processing.as_str()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        updated.ok_or_else(|| invalid_transition(&self.status, StatusTransition::Complete))
    }

    pub async fn mark_failed(
        &self,
        message: &str,
        db: &SurrealDbClient,
    ) -> Result<Document, AppError> {
        let next = compute_next_status(&self.status, StatusTransition::Fail)?;
        debug_assert_eq!(next, DocumentStatus::Failed);

        const FAIL_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET status = $failed,
                error_message = $message,
                updated_at = $now
            WHERE status = $processing
            RETURN *;
        "#;

        let now = chrono::Utc::now();
        let mut result = db
            .client
            .query(FAIL_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("failed", DocumentStatus::Failed.as_str()))
            .bind(("processing", DocumentStatus::Processing.as_str()))
            .bind(("message", message.to_string()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<Document> = result.take(0)?;
        updated.ok_or_else(|| invalid_transition(&self.status, StatusTransition::Fail))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_document(merchant_id: &str) -> Document {
        Document::new(
            merchant_id.to_string(),
            "handbook.pdf".to_string(),
            "application/pdf".to_string(),
            format!("{merchant_id}/1700000000000-handbook.pdf"),
            "abc123".to_string(),
        )
    }

    async fn memory_db() -> SurrealDbClient {
        let namespace = "test_ns";
        let database = Uuid::new_v4().to_string();
        SurrealDbClient::memory(namespace, &database)
            .await
            .expect("in-memory surrealdb")
    }

    #[tokio::test]
    async fn test_new_document_defaults() {
        let document = create_document("merchant-1");

        assert_eq!(document.merchant_id, "merchant-1");
        assert_eq!(document.status, DocumentStatus::Pending);
        assert!(document.error_message.is_none());
        assert!(!document.status.is_terminal());
    }

    #[tokio::test]
    async fn test_begin_complete_cycle() {
        let db = memory_db().await;
        let document = create_document("merchant-1");
        db.store_item(document.clone()).await.expect("store");

        let claimed = Document::try_begin_processing(&db, &document.id)
            .await
            .expect("claim")
            .expect("document claimed");
        assert_eq!(claimed.status, DocumentStatus::Processing);

        let completed = claimed.mark_completed(&db).await.expect("completed");
        assert_eq!(completed.status, DocumentStatus::Completed);
        assert!(completed.error_message.is_none());
        assert!(completed.status.is_terminal());
    }

    #[tokio::test]
    async fn test_begin_fail_records_message() {
        let db = memory_db().await;
        let document = create_document("merchant-1");
        db.store_item(document.clone()).await.expect("store");

        let claimed = Document::try_begin_processing(&db, &document.id)
            .await
            .expect("claim")
            .expect("document claimed");

        let failed = claimed
            .mark_failed("unsupported file type: text/plain", &db)
            .await
            .expect("failed update");
        assert_eq!(failed.status, DocumentStatus::Failed);
        assert_eq!(
            failed.error_message.as_deref(),
            Some("unsupported file type: text/plain")
        );
    }

    #[tokio::test]
    async fn test_second_claim_is_refused_while_processing() {
        let db = memory_db().await;
        let document = create_document("merchant-1");
        db.store_item(document.clone()).await.expect("store");

        let first = Document::try_begin_processing(&db, &document.id)
            .await
            .expect("first claim");
        assert!(first.is_some());

        let second = Document::try_begin_processing(&db, &document.id)
            .await
            .expect("second claim");
        assert!(second.is_none(), "in-flight document must not be leased twice");
    }

    #[tokio::test]
    async fn test_claim_missing_document_returns_none() {
        let db = memory_db().await;
        let claimed = Document::try_begin_processing(&db, "doc-missing")
            .await
            .expect("claim");
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn test_reprocessing_clears_error_message() {
        let db = memory_db().await;
        let document = create_document("merchant-1");
        db.store_item(document.clone()).await.expect("store");

        let claimed = Document::try_begin_processing(&db, &document.id)
            .await
            .expect("claim")
            .expect("claimed");
        claimed.mark_failed("boom", &db).await.expect("failed");

        let reclaimed = Document::try_begin_processing(&db, &document.id)
            .await
            .expect("reclaim")
            .expect("reclaimed after failure");
        assert_eq!(reclaimed.status, DocumentStatus::Processing);
        assert!(reclaimed.error_message.is_none());
    }

    #[tokio::test]
    async fn test_complete_requires_processing_state() {
        let db = memory_db().await;
        let document = create_document("merchant-1");
        db.store_item(document.clone()).await.expect("store");

        let result = document.mark_completed(&db).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
