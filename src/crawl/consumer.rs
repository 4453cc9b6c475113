// src/crawl/consumer.rs
//! The single consumer: response queue -> jobs -> pending queue.

use super::queues::RequestBacklog;
use super::registry::{JobRegistry, JobSummary};
use crate::api::responses::CrawlResponse;
use crate::constants::IDLE_BACKOFF;
use crate::error::AppError;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Jobs as the consumer left them.
#[derive(Debug, Default)]
pub struct ConsumerReport {
    pub finished: Vec<JobSummary>,
    pub unfinished: Vec<JobSummary>,
}

/// Runs until every job finished (then cancels `cancel` so the dispatch
/// workers stop too) or until cancelled from outside.
///
/// At most `drain_limit` responses are handled between two sweeps.
pub async fn run_consumer_loop(
    mut registry: JobRegistry,
    mut responses: mpsc::Receiver<CrawlResponse>,
    mut backlog: RequestBacklog,
    drain_limit: usize,
    cancel: CancellationToken,
) -> Result<ConsumerReport, AppError> {
    let mut report = ConsumerReport::default();

    while !cancel.is_cancelled() {
        let mut handled = 0;
        while handled < drain_limit {
            let Ok(response) = responses.try_recv() else {
                break;
            };
            handled += 1;
            let job_id = response.job_id().clone();
            match registry.route(response) {
                Ok(requests) => backlog.extend(requests),
                Err(e) => log::error!("Response for job {} not handled: {}", job_id, e),
            }
        }

        if let Err(e) = backlog.flush() {
            cancel.cancel();
            report.unfinished = registry.close();
            return Err(e);
        }

        report.finished.extend(registry.sweep());
        if registry.is_empty() {
            log::info!("All jobs finished");
            cancel.cancel();
            break;
        }

        if handled == 0 {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(IDLE_BACKOFF) => {}
            }
        }
    }

    report.unfinished = registry.close();
    Ok(report)
}
