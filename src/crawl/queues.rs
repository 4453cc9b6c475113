// src/crawl/queues.rs
//! The bounded queues between the dispatch workers and the consumer.

use crate::api::batch::Batch;
use crate::api::request::CrawlRequest;
use crate::error::AppError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Creates the pending-request queue.
pub fn pending_queue(capacity: usize) -> (mpsc::Sender<CrawlRequest>, PendingReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (
        sender,
        PendingReceiver {
            inner: Arc::new(Mutex::new(receiver)),
        },
    )
}

/// Receiving end of the pending queue, shared by every dispatch worker.
#[derive(Clone)]
pub struct PendingReceiver {
    inner: Arc<Mutex<mpsc::Receiver<CrawlRequest>>>,
}

impl PendingReceiver {
    /// Moves queued requests into `batch` until it is full or the queue is
    /// empty. Never waits.
    pub fn fill(&self, batch: &mut Batch) -> usize {
        let mut receiver = self.inner.lock();
        let mut taken = 0;
        while !batch.is_full() {
            let Ok(request) = receiver.try_recv() else {
                break;
            };
            match batch.add(request) {
                Ok(()) => taken += 1,
                Err(rejected) => {
                    log::error!("Batch refused {} below its capacity", rejected);
                    break;
                }
            }
        }
        taken
    }
}

/// Requests staged by jobs that did not fit in the pending queue yet.
///
/// The consumer must never wait on a full pending queue: the dispatch
/// workers that would empty it may themselves be waiting on the response
/// queue only the consumer drains.
pub struct RequestBacklog {
    sender: mpsc::Sender<CrawlRequest>,
    waiting: VecDeque<CrawlRequest>,
}

impl RequestBacklog {
    pub fn new(sender: mpsc::Sender<CrawlRequest>) -> Self {
        Self {
            sender,
            waiting: VecDeque::new(),
        }
    }

    pub fn extend(&mut self, requests: impl IntoIterator<Item = CrawlRequest>) {
        self.waiting.extend(requests);
    }

    /// Pushes as many waiting requests as the pending queue accepts, in order.
    pub fn flush(&mut self) -> Result<usize, AppError> {
        let mut sent = 0;
        while let Some(request) = self.waiting.pop_front() {
            match self.sender.try_send(request) {
                Ok(()) => sent += 1,
                Err(TrySendError::Full(request)) => {
                    self.waiting.push_front(request);
                    break;
                }
                Err(TrySendError::Closed(request)) => {
                    self.waiting.push_front(request);
                    return Err(AppError::InternalError {
                        message: "pending request queue closed".to_string(),
                        source: None,
                    });
                }
            }
        }
        if !self.waiting.is_empty() {
            log::debug!("{} requests waiting for room in the pending queue", self.waiting.len());
        }
        Ok(sent)
    }

    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

/// Crawl-wide counters updated by the dispatch workers.
#[derive(Debug, Default)]
pub struct CrawlCounters {
    batches_sent: AtomicU64,
    requests_sent: AtomicU64,
    requests_lost: AtomicU64,
    responses_discarded: AtomicU64,
}

/// Point-in-time copy of `CrawlCounters`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub batches_sent: u64,
    pub requests_sent: u64,
    pub requests_lost: u64,
    pub responses_discarded: u64,
}

impl CrawlCounters {
    pub fn record_batch(&self, requests: usize) {
        self.batches_sent.fetch_add(1, Ordering::SeqCst);
        self.requests_sent.fetch_add(requests as u64, Ordering::SeqCst);
    }

    /// Requests whose batch call failed outright.
    pub fn record_lost(&self, requests: usize) {
        self.requests_lost.fetch_add(requests as u64, Ordering::SeqCst);
    }

    /// Responses that arrived after cancellation.
    pub fn record_discarded(&self, responses: usize) {
        self.responses_discarded
            .fetch_add(responses as u64, Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            batches_sent: self.batches_sent.load(Ordering::SeqCst),
            requests_sent: self.requests_sent.load(Ordering::SeqCst),
            requests_lost: self.requests_lost.load(Ordering::SeqCst),
            responses_discarded: self.responses_discarded.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fields::FieldSet;
    use crate::api::request::RequestKind;
    use crate::types::{JobId, NodeId};
    use chrono::TimeZone;

    fn request(node: &str) -> CrawlRequest {
        let at = chrono::Utc.with_ymd_and_hms(2017, 6, 1, 0, 0, 0).unwrap();
        CrawlRequest::node(
            RequestKind::Post,
            JobId::new(at, "post", &NodeId::parse("P1_1").unwrap()),
            NodeId::parse(node).unwrap(),
            Arc::new(FieldSet::default()),
        )
    }

    #[test]
    fn backlog_holds_what_the_queue_cannot_take() {
        let (sender, receiver) = pending_queue(2);
        let mut backlog = RequestBacklog::new(sender);
        backlog.extend(["A", "B", "C"].map(request));

        assert_eq!(backlog.flush().unwrap(), 2);
        assert_eq!(backlog.len(), 1);

        let mut batch = Batch::new(10);
        assert_eq!(receiver.fill(&mut batch), 2);
        assert_eq!(backlog.flush().unwrap(), 1);
        assert!(backlog.is_empty());
        assert_eq!(receiver.fill(&mut batch), 1);

        let order: Vec<&str> = batch.requests().iter().map(|r| r.target.as_str()).collect();
        assert_eq!(order, ["A", "B", "C"]);
    }

    #[test]
    fn fill_stops_at_batch_capacity() {
        let (sender, receiver) = pending_queue(10);
        let mut backlog = RequestBacklog::new(sender);
        backlog.extend(["A", "B", "C"].map(request));
        backlog.flush().unwrap();

        let mut batch = Batch::new(2);
        assert_eq!(receiver.fill(&mut batch), 2);
        assert!(batch.is_full());
        let mut rest = Batch::new(2);
        assert_eq!(receiver.fill(&mut rest), 1);
    }

    #[test]
    fn flush_reports_a_closed_queue() {
        let (sender, receiver) = pending_queue(2);
        drop(receiver);
        let mut backlog = RequestBacklog::new(sender);
        backlog.extend([request("A")]);
        assert!(backlog.flush().is_err());
        assert_eq!(backlog.len(), 1);
    }

    #[test]
    fn counters_accumulate() {
        let counters = CrawlCounters::default();
        counters.record_batch(3);
        counters.record_batch(2);
        counters.record_lost(2);
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.batches_sent, 2);
        assert_eq!(snapshot.requests_sent, 5);
        assert_eq!(snapshot.requests_lost, 2);
        assert_eq!(snapshot.responses_discarded, 0);
    }
}
