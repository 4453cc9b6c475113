// src/crawl/dispatch.rs
//! Dispatch workers: pending queue -> batch call -> response queue.

use super::queues::{CrawlCounters, PendingReceiver};
use crate::api::batch::Batch;
use crate::api::responses::CrawlResponse;
use crate::api::GraphTransport;
use crate::constants::IDLE_BACKOFF;
use crate::error::AppError;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Everything one dispatch worker needs.
pub struct DispatchWorker {
    pub worker: usize,
    pub transport: Arc<dyn GraphTransport>,
    pub pending: PendingReceiver,
    pub responses: mpsc::Sender<CrawlResponse>,
    pub batch_size: usize,
    pub counters: Arc<CrawlCounters>,
}

/// Runs one dispatch worker until cancelled.
///
/// A failed batch call is logged and its requests are counted as lost;
/// they are not retried and their jobs will not finish on their own.
pub async fn run_dispatch_loop(
    worker: DispatchWorker,
    cancel: CancellationToken,
) -> Result<(), AppError> {
    let id = worker.worker;
    log::debug!("Dispatch worker {} started", id);

    while !cancel.is_cancelled() {
        let mut batch = Batch::new(worker.batch_size);
        if worker.pending.fill(&mut batch) == 0 {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(IDLE_BACKOFF) => continue,
            }
        }

        log::info!("Worker {} sending {}", id, batch);
        worker.counters.record_batch(batch.len());
        let raw = match worker.transport.execute_batch(&batch.to_wire()).await {
            Ok(raw) => raw,
            Err(e) => {
                log::error!(
                    "Worker {} lost a batch of {} requests: {}",
                    id,
                    batch.len(),
                    e
                );
                worker.counters.record_lost(batch.len());
                continue;
            }
        };

        if cancel.is_cancelled() {
            log::debug!("Worker {} discarding {} late results", id, batch.len());
            worker.counters.record_discarded(batch.len());
            break;
        }

        let mut responses = batch.demux(raw).into_iter();
        while let Some(response) = responses.next() {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    worker.counters.record_discarded(1 + responses.len());
                    log::debug!("Dispatch worker {} stopped", id);
                    return Ok(());
                }
                sent = worker.responses.send(response) => {
                    if sent.is_err() {
                        log::debug!("Response queue closed, worker {} stopping", id);
                        return Ok(());
                    }
                }
            }
        }
    }

    log::debug!("Dispatch worker {} stopped", id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::batch::BatchEntry;
    use crate::api::fields::FieldSet;
    use crate::api::request::{CrawlRequest, RequestKind};
    use crate::api::responses::RawItem;
    use crate::crawl::queues::{pending_queue, RequestBacklog};
    use crate::types::{JobId, NodeId};
    use chrono::TimeZone;

    struct Echo;

    #[async_trait::async_trait]
    impl GraphTransport for Echo {
        async fn execute_batch(&self, entries: &[BatchEntry]) -> Result<Vec<Option<RawItem>>, AppError> {
            Ok(entries
                .iter()
                .map(|e| {
                    let id = e.relative_url.split('?').next().unwrap_or_default();
                    Some(RawItem::new(200, format!(r#"{{"id":"{}"}}"#, id)))
                })
                .collect())
        }
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl GraphTransport for Unreachable {
        async fn execute_batch(&self, _entries: &[BatchEntry]) -> Result<Vec<Option<RawItem>>, AppError> {
            Err(AppError::MissingConfiguration("no network in tests".to_string()))
        }
    }

    /// Answers every entry, but cancels the crawl while the call is in flight.
    struct CancelledMidCall(CancellationToken);

    #[async_trait::async_trait]
    impl GraphTransport for CancelledMidCall {
        async fn execute_batch(&self, entries: &[BatchEntry]) -> Result<Vec<Option<RawItem>>, AppError> {
            self.0.cancel();
            Ok(entries
                .iter()
                .map(|_| Some(RawItem::new(200, r#"{"id":"P1_1"}"#)))
                .collect())
        }
    }

    fn requests(n: usize) -> Vec<CrawlRequest> {
        let at = chrono::Utc.with_ymd_and_hms(2017, 6, 1, 0, 0, 0).unwrap();
        let job_id = JobId::new(at, "post", &NodeId::parse("P1_1").unwrap());
        (0..n)
            .map(|i| {
                CrawlRequest::node(
                    RequestKind::Post,
                    job_id.clone(),
                    NodeId::parse(&format!("P1_{}", i)).unwrap(),
                    Arc::new(FieldSet::default()),
                )
            })
            .collect()
    }

    fn worker(
        transport: Arc<dyn GraphTransport>,
        batch_size: usize,
        counters: Arc<CrawlCounters>,
    ) -> (DispatchWorker, RequestBacklog, mpsc::Receiver<CrawlResponse>) {
        let (pending_tx, pending) = pending_queue(100);
        let (responses, response_rx) = mpsc::channel(100);
        let worker = DispatchWorker {
            worker: 0,
            transport,
            pending,
            responses,
            batch_size,
            counters,
        };
        (worker, RequestBacklog::new(pending_tx), response_rx)
    }

    #[tokio::test]
    async fn batches_requests_and_returns_one_response_each() {
        let counters = Arc::new(CrawlCounters::default());
        let (worker, mut backlog, mut responses) = worker(Arc::new(Echo), 2, Arc::clone(&counters));
        backlog.extend(requests(5));
        backlog.flush().unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_dispatch_loop(worker, cancel.clone()));

        let mut targets = Vec::new();
        for _ in 0..5 {
            let response = responses.recv().await.unwrap();
            assert!(!response.is_failure());
            targets.push(response.request.target.to_string());
        }
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(targets, ["P1_0", "P1_1", "P1_2", "P1_3", "P1_4"]);
        assert_eq!(counters.snapshot().batches_sent, 3);
    }

    #[tokio::test]
    async fn failed_calls_count_requests_as_lost() {
        let counters = Arc::new(CrawlCounters::default());
        let (worker, mut backlog, mut responses) =
            worker(Arc::new(Unreachable), 50, Arc::clone(&counters));
        backlog.extend(requests(3));
        backlog.flush().unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_dispatch_loop(worker, cancel.clone()));
        while counters.snapshot().requests_lost < 3 {
            tokio::time::sleep(IDLE_BACKOFF).await;
        }
        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert!(responses.try_recv().is_err());
        assert_eq!(counters.snapshot().requests_lost, 3);
    }

    #[tokio::test]
    async fn results_arriving_after_cancellation_are_discarded() {
        let cancel = CancellationToken::new();
        let counters = Arc::new(CrawlCounters::default());
        let transport = Arc::new(CancelledMidCall(cancel.clone()));
        let (worker, mut backlog, mut responses) = worker(transport, 50, Arc::clone(&counters));
        backlog.extend(requests(3));
        backlog.flush().unwrap();

        run_dispatch_loop(worker, cancel.clone()).await.unwrap();

        assert!(cancel.is_cancelled());
        assert!(responses.try_recv().is_err());
        let counts = counters.snapshot();
        assert_eq!(counts.batches_sent, 1);
        assert_eq!(counts.requests_sent, 3);
        assert_eq!(counts.responses_discarded, 3);
        assert_eq!(counts.requests_lost, 0);
    }
}
