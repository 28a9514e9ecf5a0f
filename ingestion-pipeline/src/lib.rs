#![allow(clippy::missing_docs_in_private_items)]

pub mod chunker;
pub mod extract;
pub mod pipeline;
pub mod upload;
pub mod vector;

use std::sync::Arc;

use common::storage::{db::SurrealDbClient, types::index_job::IndexJob};
pub use pipeline::{DocumentWorker, IndexError};
use tokio::time::{sleep, Duration};
use tracing::{error, info};
use uuid::Uuid;

pub async fn run_worker_loop(
    db: Arc<SurrealDbClient>,
    worker: Arc<DocumentWorker>,
) -> Result<(), Box<dyn std::error::Error>> {
    let worker_id = format!("index-worker-{}", Uuid::new_v4());
    let idle_backoff = Duration::from_millis(500);

    loop {
        match IndexJob::claim_next_ready(&db, &worker_id).await {
            Ok(Some(job)) => {
                let job_id = job.id.clone();
                info!(
                    %worker_id,
                    %job_id,
                    document_id = %job.document_id,
                    "claimed index job"
                );
                if let Err(err) = worker.process_job(job).await {
                    error!(%worker_id, %job_id, error = %err, "index job failed");
                }
            }
            Ok(None) => {
                sleep(idle_backoff).await;
            }
            Err(err) => {
                error!(%worker_id, error = %err, "failed to claim index job");
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}
