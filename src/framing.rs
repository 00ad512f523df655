//! Line-oriented framing of poll responses.
//!
//! The filter endpoints answer with a sequence of JSON objects, one per line.
//! While the server is still computing, those objects are empty (`{}`) or carry
//! a `next_page_token`; once the result is ready an object carrying the payload
//! (`data` rows, or a `count`) appears, usually at the end of the body.
//!
//! [`parse`] reduces such a body to a single [`PollResult`]. Lines that fail to
//! parse are reported through `tracing` and skipped, so a corrupt progress line
//! never hides a terminal payload.

use crate::{
    Error, Result,
    types::{QueryPage, RowCount},
};
use serde_json::{Map, Value};

pub const NEXT_PAGE_TOKEN: &str = "next_page_token";

pub type Object = Map<String, Value>;

/// A response object that ends polling.
pub trait Terminal: Sized {
    /// Extract the terminal payload, or `None` if `object` does not carry one.
    fn from_object(object: &Object) -> Option<Self>;
}

impl Terminal for QueryPage {
    fn from_object(object: &Object) -> Option<Self> {
        let data = object.get("data")?.as_array()?.clone();
        let mut extra = object.clone();
        extra.remove("data");
        let pagination = extra.remove("pagination").filter(|p| !p.is_null());
        Some(QueryPage {
            data,
            pagination,
            extra,
        })
    }
}

impl Terminal for RowCount {
    fn from_object(object: &Object) -> Option<Self> {
        let count = object.get("count")?.as_u64()?;
        Some(RowCount { count })
    }
}

/// How to continue after a non-terminal response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Continuation {
    /// The server issued a token to echo back on the next poll.
    Token(String),
    /// Nothing but empty objects; poll again without changing the token.
    EmptyPoll,
}

/// Classification of one response body
#[derive(Debug, Clone, PartialEq)]
pub enum PollResult<T> {
    Terminal(T),
    Continuation(Continuation),
    /// Parsed, but none of the known shapes. Holds the last non-empty object.
    Ambiguous(Object),
}

/// A line (or trailing fragment of a line) that could not be used
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    /// 1-based line number within the body
    pub line: usize,
    pub message: String,
}

/// Split `body` into its JSON objects, collecting per-line failures.
///
/// Several objects may share a line; parsing of a line stops at its first
/// error, keeping whatever objects preceded it.
pub fn frame_lines(body: &str) -> (Vec<Object>, Vec<LineError>) {
    let mut objects = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in body.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        for item in serde_json::Deserializer::from_str(line).into_iter::<Value>() {
            match item {
                Ok(Value::Object(object)) => objects.push(object),
                Ok(other) => errors.push(LineError {
                    line: idx + 1,
                    message: format!("expected a JSON object, found {}", value_kind(&other)),
                }),
                Err(e) => {
                    errors.push(LineError {
                        line: idx + 1,
                        message: e.to_string(),
                    });
                    break;
                }
            }
        }
    }

    (objects, errors)
}

/// Classify a raw poll response body.
pub fn parse<T: Terminal>(body: &str) -> Result<PollResult<T>> {
    let (objects, errors) = frame_lines(body);

    for err in &errors {
        tracing::warn!(line = err.line, error = %err.message, "skipping unparseable response line");
    }

    if objects.is_empty() {
        return Err(Error::Framing(
            "no valid JSON objects in response".to_string(),
        ));
    }

    // A terminal payload wins over any token in the same body.
    if let Some(terminal) = objects.iter().rev().find_map(T::from_object) {
        return Ok(PollResult::Terminal(terminal));
    }

    if let Some(token) = objects.iter().rev().find_map(token_of) {
        return Ok(PollResult::Continuation(Continuation::Token(
            token.to_string(),
        )));
    }

    match objects.into_iter().rev().find(|o| !is_empty_frame(o)) {
        None => Ok(PollResult::Continuation(Continuation::EmptyPoll)),
        Some(object) => Ok(PollResult::Ambiguous(object)),
    }
}

fn token_of(object: &Object) -> Option<&str> {
    object
        .get(NEXT_PAGE_TOKEN)
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
}

/// `{}`, or an object whose only field is a null or blank token.
fn is_empty_frame(object: &Object) -> bool {
    match object.len() {
        0 => true,
        1 => object
            .get(NEXT_PAGE_TOKEN)
            .is_some_and(|t| t.is_null() || t.as_str() == Some("")),
        _ => false,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
