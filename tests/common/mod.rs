// tests/common/mod.rs
//! Scripted Graph API transports for driving the crawler without a network.

#![allow(dead_code)]

use async_trait::async_trait;
use graphcrawl::{AppError, BatchEntry, GraphTransport, RawItem};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers each sub-request by the longest registered path prefix.
///
/// Unmatched paths get an inline API error so a missing route shows up as
/// a failure instead of a hung crawl.
#[derive(Default)]
pub struct ScriptedGraph {
    routes: Vec<(String, Option<RawItem>)>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl ScriptedGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers paths starting with `prefix` with `body`.
    pub fn route(mut self, prefix: &str, body: Value) -> Self {
        self.routes
            .push((prefix.to_string(), Some(RawItem::new(200, body.to_string()))));
        self
    }

    /// Answers paths starting with `prefix` with an inline error object.
    pub fn error(mut self, prefix: &str, message: &str) -> Self {
        let body = serde_json::json!({"error": {"message": message, "code": 1}});
        self.routes
            .push((prefix.to_string(), Some(RawItem::new(500, body.to_string()))));
        self
    }

    /// Answers paths starting with `prefix` with a `null` slot.
    pub fn null(mut self, prefix: &str) -> Self {
        self.routes.push((prefix.to_string(), None));
        self
    }

    /// Every batch sent so far, as relative urls.
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    /// Number of sub-requests whose path starts with `prefix`.
    pub fn hits(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .flatten()
            .filter(|url| url.starts_with(prefix))
            .count()
    }

    fn answer(&self, url: &str) -> Option<RawItem> {
        let best = self
            .routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len());
        match best {
            Some((_, item)) => item.clone(),
            None => Some(RawItem::new(
                400,
                format!(r#"{{"error":{{"message":"no route for {}"}}}}"#, url),
            )),
        }
    }
}

#[async_trait]
impl GraphTransport for ScriptedGraph {
    async fn execute_batch(&self, entries: &[BatchEntry]) -> Result<Vec<Option<RawItem>>, AppError> {
        let urls: Vec<String> = entries.iter().map(|e| e.relative_url.clone()).collect();
        let answers = urls.iter().map(|url| self.answer(url)).collect();
        self.calls.lock().push(urls);
        Ok(answers)
    }
}

/// A transport whose every batch call fails.
#[derive(Default)]
pub struct Unreachable {
    calls: AtomicUsize,
}

impl Unreachable {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphTransport for Unreachable {
    async fn execute_batch(&self, _entries: &[BatchEntry]) -> Result<Vec<Option<RawItem>>, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(AppError::BatchRejected {
            status: reqwest::StatusCode::BAD_GATEWAY,
            body: "upstream unavailable".to_string(),
        })
    }
}
