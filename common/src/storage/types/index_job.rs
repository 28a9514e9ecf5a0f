use surrealdb::sql::Datetime as SurrealDatetime;
use uuid::Uuid;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_object};

use super::document::Document;

#[derive(Debug, Default, Clone, Copy, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub enum JobState {
    #[serde(rename = "Queued")]
    #[default]
    Queued,
    #[serde(rename = "Running")]
    Running,
    #[serde(rename = "Done")]
    Done,
    #[serde(rename = "Failed")]
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "Queued",
            JobState::Running => "Running",
            JobState::Done => "Done",
            JobState::Failed => "Failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Failed)
    }
}

stored_object!(IndexJob, "index_job", {
    document_id: String,
    merchant_id: String,
    state: JobState,
    worker_id: Option<String>,
    error_message: Option<String>
});

impl IndexJob {
    pub fn new(document_id: String, merchant_id: String) -> Self {
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            document_id,
            merchant_id,
            state: JobState::Queued,
            worker_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Enqueues one job for the given document.
    pub async fn create_and_add_to_db(
        document: &Document,
        db: &SurrealDbClient,
    ) -> Result<IndexJob, AppError> {
        let job = Self::new(document.id.clone(), document.merchant_id.clone());
        db.store_item(job.clone()).await?;
        Ok(job)
    }

    /// Atomically claims the oldest queued job for this worker. Two workers
    /// polling the same table cannot claim the same row.
    pub async fn claim_next_ready(
        db: &SurrealDbClient,
        worker_id: &str,
    ) -> Result<Option<IndexJob>, AppError> {
        const CLAIM_QUERY: &str = r#"
            UPDATE (
                SELECT * FROM type::table($table)
                WHERE state = $queued
                ORDER BY created_at ASC
                LIMIT 1
            )
            SET state = $running,
                worker_id = $worker_id,
                updated_at = $now
            RETURN *;
        "#;

        let now = chrono::Utc::now();
        let mut result = db
            .client
            .query(CLAIM_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("queued", JobState::Queued.as_str()))
            .bind(("running", JobState::Running.as_str()))
            .bind(("worker_id", worker_id.to_string()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let job: Option<IndexJob> = result.take(0)?;
        Ok(job)
    }

    pub async fn mark_done(&self, db: &SurrealDbClient) -> Result<IndexJob, AppError> {
        self.finish(JobState::Done, None, db).await
    }

    pub async fn mark_failed(
        &self,
        message: &str,
        db: &SurrealDbClient,
    ) -> Result<IndexJob, AppError> {
        self.finish(JobState::Failed, Some(message.to_string()), db)
            .await
    }

    async fn finish(
        &self,
        state: JobState,
        error_message: Option<String>,
        db: &SurrealDbClient,
    ) -> Result<IndexJob, AppError> {
        const FINISH_QUERY: &str = r#"
            UPDATE type::thing($table, $id)
            SET state = $state,
                error_message = $message,
                updated_at = $now
            WHERE state = $running AND worker_id = $worker_id
            RETURN *;
        "#;

        let now = chrono::Utc::now();
        let mut result = db
            .client
            .query(FINISH_QUERY)
            .bind(("table", Self::table_name()))
            .bind(("id", self.id.clone()))
            .bind(("state", state.as_str()))
            .bind(("message", error_message))
            .bind(("running", JobState::Running.as_str()))
            .bind(("worker_id", self.worker_id.clone().unwrap_or_default()))
            .bind(("now", SurrealDatetime::from(now)))
            .await?;

        let updated: Option<IndexJob> = result.take(0)?;
        updated.ok_or_else(|| {
            AppError::Validation(format!(
                "Invalid job transition: {} -> {}",
                self.state.as_str(),
                state.as_str()
            ))
        })
    }
}
