// src/crawl/mod.rs
//! The crawl engine.
//!
//! `Crawler::run` registers the jobs, spawns the dispatch workers and the
//! consumer, and waits until every job finished or the crawl was
//! cancelled. The two bounded queues are the only state the tasks share.

pub mod consumer;
pub mod dispatch;
pub mod job;
pub mod queues;
pub mod registry;

use crate::api::GraphTransport;
use crate::constants::{BATCH_LIMIT, QUEUE_CAPACITY};
use crate::error::{AppError, Result};
use crate::output::SinkFactory;
use consumer::run_consumer_loop;
use dispatch::{run_dispatch_loop, DispatchWorker};
use job::Job;
use queues::{pending_queue, CrawlCounters, RequestBacklog};
use registry::{JobRegistry, JobSummary};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Worker pool and queue sizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlSettings {
    pub workers: usize,
    pub batch_size: usize,
    pub queue_capacity: usize,
}

impl Default for CrawlSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            batch_size: BATCH_LIMIT,
            queue_capacity: QUEUE_CAPACITY,
        }
    }
}

/// Outcome of `Crawler::run`.
#[derive(Debug, Clone, Default)]
pub struct CrawlReport {
    pub finished: Vec<JobSummary>,
    /// Jobs still active when the crawl was cancelled.
    pub unfinished: Vec<JobSummary>,
    pub batches_sent: u64,
    pub requests_sent: u64,
    /// Requests whose batch call failed.
    pub requests_lost: u64,
    pub cancelled: bool,
}

impl CrawlReport {
    pub fn is_complete(&self) -> bool {
        self.unfinished.is_empty()
    }
}

pub struct Crawler {
    transport: Arc<dyn GraphTransport>,
    sinks: Arc<dyn SinkFactory>,
    settings: CrawlSettings,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(
        transport: Arc<dyn GraphTransport>,
        sinks: Arc<dyn SinkFactory>,
        settings: CrawlSettings,
    ) -> Self {
        Self {
            transport,
            sinks,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that stops a running crawl when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Crawls every job to completion, or until cancelled.
    pub async fn run(&self, jobs: Vec<Job>) -> Result<CrawlReport> {
        let capacity = self.settings.queue_capacity.max(1);
        let workers = self.settings.workers.max(1);
        let cancel = self.cancel.child_token();

        let (pending_tx, pending) = pending_queue(capacity);
        let (response_tx, response_rx) = mpsc::channel(capacity);
        let mut registry = JobRegistry::new(Arc::clone(&self.sinks));
        let mut backlog = RequestBacklog::new(pending_tx);

        for job in jobs {
            backlog.extend(registry.add_job(job)?);
        }
        if registry.is_empty() {
            log::warn!("Nothing to crawl");
            return Ok(CrawlReport::default());
        }
        backlog.flush()?;

        log::info!(
            "Crawling {} job(s) with {} dispatch worker(s), batches of {}",
            registry.len(),
            workers,
            self.settings.batch_size
        );

        let counters = Arc::new(CrawlCounters::default());
        let mut dispatchers = JoinSet::new();
        for worker in 0..workers {
            let worker = DispatchWorker {
                worker,
                transport: Arc::clone(&self.transport),
                pending: pending.clone(),
                responses: response_tx.clone(),
                batch_size: self.settings.batch_size,
                counters: Arc::clone(&counters),
            };
            dispatchers.spawn(run_dispatch_loop(worker, cancel.clone()));
        }
        drop(response_tx);

        let consumed = tokio::spawn(run_consumer_loop(
            registry,
            response_rx,
            backlog,
            capacity,
            cancel.clone(),
        ))
        .await
        .map_err(AppError::from)
        .and_then(|result| result);

        cancel.cancel();
        while let Some(joined) = dispatchers.join_next().await {
            joined??;
        }
        let consumed = consumed?;

        let counts = counters.snapshot();
        if counts.requests_lost > 0 {
            log::warn!("{} requests were lost to failed batch calls", counts.requests_lost);
        }
        Ok(CrawlReport {
            finished: consumed.finished,
            unfinished: consumed.unfinished,
            batches_sent: counts.batches_sent,
            requests_sent: counts.requests_sent,
            requests_lost: counts.requests_lost,
            cancelled: self.cancel.is_cancelled(),
        })
    }
}
