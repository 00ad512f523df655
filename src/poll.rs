//! Polling driver for the asynchronous filter endpoints.
//!
//! A filter query is submitted repeatedly until the server answers with a
//! terminal payload. Each attempt rebuilds its request body from the immutable
//! [`QuerySpec`] plus the most recent continuation token:
//!
//! - terminal payload: done, no further requests
//! - new token: replaces the carried token, then sleep and retry
//! - empty poll: keep the carried token (if any), then sleep and retry
//! - ambiguous object: [`Error::UnexpectedFormat`]
//!
//! Once `max_polls` attempts have been made without a terminal payload the call
//! fails with [`Error::Timeout`]. There is no sleep after the final attempt.
//! Transport, HTTP status and framing errors abort immediately.
//!
//! The returned future can be dropped at any point (for example under
//! `tokio::time::timeout`) to abandon the query.

use crate::{
    Error, Result,
    framing::{self, Continuation, PollResult, Terminal},
    transport::Transport,
    types::{QueryPage, QuerySpec, RowCount},
};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_MAX_POLLS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Poll budget for one logical query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub max_polls: u32,
    pub poll_interval: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_polls: DEFAULT_MAX_POLLS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl PollPolicy {
    pub fn new(max_polls: u32, poll_interval: Duration) -> Self {
        Self {
            max_polls,
            poll_interval,
        }
    }

    /// Nominal time budget, `max_polls * poll_interval`.
    pub fn budget(&self) -> Duration {
        self.poll_interval.saturating_mul(self.max_polls)
    }
}

/// A request that is submitted until a terminal payload arrives
pub trait PolledRequest: Sync {
    type Output: Terminal + Send;

    /// Endpoint path segments below the base URL.
    fn path(&self) -> Vec<&str>;

    /// Request body for one attempt.
    fn payload(&self, token: Option<&str>) -> Result<Value>;
}

/// `POST .../filter` for a [`QuerySpec`]
#[derive(Debug, Clone, Copy)]
pub struct RowsRequest<'a>(pub &'a QuerySpec);

impl PolledRequest for RowsRequest<'_> {
    type Output = QueryPage;

    fn path(&self) -> Vec<&str> {
        vec![
            "api",
            "collections",
            self.0.collection.as_str(),
            "tables",
            self.0.table.as_str(),
            "filter",
        ]
    }

    fn payload(&self, token: Option<&str>) -> Result<Value> {
        to_value(&self.0.query_payload(token))
    }
}

/// `POST .../filter/count` for a [`QuerySpec`]
#[derive(Debug, Clone, Copy)]
pub struct CountRequest<'a>(pub &'a QuerySpec);

impl PolledRequest for CountRequest<'_> {
    type Output = RowCount;

    fn path(&self) -> Vec<&str> {
        vec![
            "api",
            "collections",
            self.0.collection.as_str(),
            "tables",
            self.0.table.as_str(),
            "filter",
            "count",
        ]
    }

    fn payload(&self, token: Option<&str>) -> Result<Value> {
        to_value(&self.0.count_payload(token))
    }
}

fn to_value<T: serde::Serialize>(payload: &T) -> Result<Value> {
    serde_json::to_value(payload)
        .map_err(|e| Error::Validation(format!("request body is not valid JSON: {e}")))
}

/// Submit `request` until it completes or the poll budget runs out.
pub async fn execute<T, R>(transport: &T, request: &R, policy: PollPolicy) -> Result<R::Output>
where
    T: Transport + ?Sized,
    R: PolledRequest,
{
    if policy.max_polls == 0 {
        return Err(Error::Validation("max_polls must be at least 1".to_string()));
    }

    let path = request.path();
    let mut token: Option<String> = None;

    for attempt in 1..=policy.max_polls {
        let payload = request.payload(token.as_deref())?;
        tracing::debug!(
            attempt,
            max_polls = policy.max_polls,
            has_token = token.is_some(),
            "submitting poll"
        );

        let body = transport.post_json(&path, &payload).await?;

        match framing::parse::<R::Output>(&body)? {
            PollResult::Terminal(output) => {
                tracing::debug!(attempt, "poll completed");
                return Ok(output);
            }
            PollResult::Continuation(Continuation::Token(next)) => {
                tracing::trace!(attempt, "received continuation token");
                token = Some(next);
            }
            PollResult::Continuation(Continuation::EmptyPoll) => {
                tracing::trace!(attempt, "empty poll");
            }
            PollResult::Ambiguous(object) => {
                let mut keys: Vec<String> = object.keys().cloned().collect();
                keys.sort();
                tracing::warn!(attempt, ?keys, "unexpected response format");
                return Err(Error::UnexpectedFormat { keys });
            }
        }

        if attempt < policy.max_polls {
            tokio::time::sleep(policy.poll_interval).await;
        }
    }

    tracing::warn!(polls = policy.max_polls, "poll budget exhausted");
    Err(Error::Timeout {
        polls: policy.max_polls,
        budget: policy.budget(),
    })
}
