// src/api/responses.rs
//! Batch results and the responses handed to jobs.

use super::request::{CrawlRequest, RequestKind};
use crate::error::ItemFailure;
use crate::types::JobId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One slot of the batch endpoint's answer.
///
/// The body is itself a JSON document serialized as a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawItem {
    pub code: u16,
    #[serde(default)]
    pub body: Option<String>,
}

impl RawItem {
    pub fn new(code: u16, body: impl Into<String>) -> Self {
        Self {
            code,
            body: Some(body.into()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct InlineError {
    error: InlineErrorDetail,
}

#[derive(Debug, Deserialize)]
struct InlineErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<i64>,
}

/// Decodes a batch slot into a payload or a failure classification.
pub fn decode_item(item: Option<RawItem>) -> ResponseBody {
    let Some(item) = item else {
        return ResponseBody::Failed(ItemFailure::Missing);
    };
    let Some(body) = item.body else {
        return ResponseBody::Failed(ItemFailure::UndecodableBody {
            cause: format!("empty body (HTTP {})", item.code),
        });
    };
    let value: Value = match serde_json::from_str(&body) {
        Ok(value) => value,
        Err(e) => {
            return ResponseBody::Failed(ItemFailure::UndecodableBody {
                cause: e.to_string(),
            })
        }
    };
    if value.get("error").is_some() {
        return match serde_json::from_value::<InlineError>(value) {
            Ok(inline) => ResponseBody::Failed(ItemFailure::from_inline_error(
                inline.error.code,
                inline.error.message,
            )),
            Err(e) => ResponseBody::Failed(ItemFailure::Api {
                code: None,
                message: format!("unreadable error object: {}", e),
            }),
        };
    }
    ResponseBody::Payload(value)
}

/// Either the decoded body of a successful item or why it failed.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    Payload(Value),
    Failed(ItemFailure),
}

/// A response re-associated with the request that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlResponse {
    pub request: CrawlRequest,
    pub body: ResponseBody,
}

impl CrawlResponse {
    pub fn new(request: CrawlRequest, body: ResponseBody) -> Self {
        Self { request, body }
    }

    pub fn kind(&self) -> RequestKind {
        self.request.kind
    }

    pub fn job_id(&self) -> &JobId {
        &self.request.job_id
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.body, ResponseBody::Failed(_))
    }
}
