// src/api/batch.rs
//! Aggregates pending requests into one bounded batch call.
//!
//! The batch endpoint answers positionally: slot `i` of the result list
//! belongs to request `i` of the submitted list. `demux` relies on that to
//! rebuild one `CrawlResponse` per request.

use super::request::CrawlRequest;
use super::responses::{decode_item, CrawlResponse, RawItem, ResponseBody};
use crate::constants::BATCH_LIMIT;
use crate::error::{AppError, ItemFailure};
use serde::Serialize;
use std::fmt;

/// One entry of the batch endpoint's `batch` parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchEntry {
    pub method: &'static str,
    pub relative_url: String,
}

/// A bounded, ordered group of requests sent in one remote call.
#[derive(Debug, Clone)]
pub struct Batch {
    requests: Vec<CrawlRequest>,
    capacity: usize,
}

impl Batch {
    /// Creates an empty batch. Capacity is clamped to `1..=BATCH_LIMIT`.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, BATCH_LIMIT);
        Self {
            requests: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Adds a request, or hands it back when the batch is already full.
    pub fn add(&mut self, request: CrawlRequest) -> Result<(), CrawlRequest> {
        if self.is_full() {
            return Err(request);
        }
        self.requests.push(request);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.requests.len() == self.capacity
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn requests(&self) -> &[CrawlRequest] {
        &self.requests
    }

    /// The batch in wire order.
    pub fn to_wire(&self) -> Vec<BatchEntry> {
        self.requests
            .iter()
            .map(|request| BatchEntry {
                method: "GET",
                relative_url: request.relative_path(),
            })
            .collect()
    }

    /// The `batch` parameter as a JSON string.
    pub fn to_wire_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(&self.to_wire())?)
    }

    /// Pairs result slot `i` with request `i`, consuming the batch.
    ///
    /// Always yields exactly one response per request: slots the API did
    /// not return become `ItemFailure::Missing`, surplus slots are dropped.
    pub fn demux(self, raw: Vec<Option<RawItem>>) -> Vec<CrawlResponse> {
        if raw.len() != self.requests.len() {
            log::warn!(
                "Batch returned {} results for {} requests",
                raw.len(),
                self.requests.len()
            );
        }
        let mut slots = raw.into_iter();
        self.requests
            .into_iter()
            .map(|request| {
                let body = match slots.next() {
                    Some(item) => decode_item(item),
                    None => ResponseBody::Failed(ItemFailure::Missing),
                };
                CrawlResponse::new(request, body)
            })
            .collect()
    }
}

impl fmt::Display for Batch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kinds: Vec<&str> = self.requests.iter().map(|r| r.kind.as_str()).collect();
        write!(
            f,
            "{} requests of types: [{}]",
            self.requests.len(),
            kinds.join(",")
        )
    }
}
