//! Raw store replies and their normalization
//!
//! Backends hand back a [`RawReply`]. The executor then applies the
//! operation's [`ReplyPolicy`] to get a [`Reply`], and a typed decoder turns
//! that into the value the caller sees.

use serde_json::Value;

use crate::command::ReplyPolicy;
use crate::error::{CacheError, CacheResult};

/// Reply as received from the store, before any interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawReply {
    Nil,
    Int(i64),
    Bulk(String),
    Array(Vec<RawReply>),
}

impl RawReply {
    /// Shorthand for an array of bulk strings
    pub fn bulk_array<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RawReply::Array(items.into_iter().map(|s| RawReply::Bulk(s.into())).collect())
    }
}

/// Reply after the operation's policy has been applied
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Parsed(Value),
    Raw(RawReply),
}

/// One batch of a cursor scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` means the pass is complete
    pub cursor: u64,
    pub members: Vec<String>,
}

impl ScanPage {
    pub fn is_complete(&self) -> bool {
        self.cursor == 0
    }
}

/// Apply a reply policy to a raw reply
pub fn normalize(policy: ReplyPolicy, raw: RawReply) -> CacheResult<Reply> {
    match policy {
        ReplyPolicy::Parse => parse(raw).map(Reply::Parsed),
        ReplyPolicy::PassThrough => Ok(Reply::Raw(raw)),
    }
}

fn parse(raw: RawReply) -> CacheResult<Value> {
    match raw {
        RawReply::Nil => Ok(Value::Null),
        RawReply::Int(n) => Ok(Value::from(n)),
        RawReply::Bulk(text) => Ok(serde_json::from_str(&text)?),
        RawReply::Array(items) => items
            .into_iter()
            .map(parse)
            .collect::<CacheResult<Vec<_>>>()
            .map(Value::Array),
    }
}

fn expect_parsed(reply: Reply) -> CacheResult<Value> {
    match reply {
        Reply::Parsed(value) => Ok(value),
        Reply::Raw(raw) => Err(CacheError::Decode(format!(
            "expected a parsed reply, got raw {:?}",
            raw
        ))),
    }
}

fn expect_raw(reply: Reply) -> CacheResult<RawReply> {
    match reply {
        Reply::Raw(raw) => Ok(raw),
        Reply::Parsed(value) => Err(CacheError::Decode(format!(
            "expected a raw reply, got parsed {}",
            value
        ))),
    }
}

/// Decode an integer count (SADD, SREM, SCARD)
pub fn into_count(reply: Reply) -> CacheResult<u64> {
    let value = expect_parsed(reply)?;
    value
        .as_u64()
        .ok_or_else(|| CacheError::Decode(format!("expected a count, got {}", value)))
}

/// Decode a 1/0 membership flag (SISMEMBER)
pub fn into_flag(reply: Reply) -> CacheResult<bool> {
    match expect_parsed(reply)? {
        Value::Bool(flag) => Ok(flag),
        Value::Number(n) if n.as_u64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_u64() == Some(0) => Ok(false),
        other => Err(CacheError::Decode(format!(
            "expected a 1/0 flag, got {}",
            other
        ))),
    }
}

/// Decode popped members (SPOP with or without a count)
pub fn into_values(reply: Reply) -> CacheResult<Vec<Value>> {
    match expect_parsed(reply)? {
        Value::Null => Ok(Vec::new()),
        Value::Array(items) => Ok(items),
        single => Ok(vec![single]),
    }
}

fn bulk_strings(items: Vec<RawReply>) -> CacheResult<Vec<String>> {
    items
        .into_iter()
        .map(|item| match item {
            RawReply::Bulk(s) => Ok(s),
            RawReply::Int(n) => Ok(n.to_string()),
            other => Err(CacheError::Decode(format!(
                "expected a member string, got {:?}",
                other
            ))),
        })
        .collect()
}

/// Member strings as the store sent them (SMEMBERS)
pub fn into_members(reply: Reply) -> CacheResult<Vec<String>> {
    match expect_raw(reply)? {
        RawReply::Nil => Ok(Vec::new()),
        RawReply::Array(items) => bulk_strings(items),
        other => Err(CacheError::Decode(format!(
            "expected a member list, got {:?}",
            other
        ))),
    }
}

/// Cursor and batch of a scan step (SSCAN)
pub fn into_scan_page(reply: Reply) -> CacheResult<ScanPage> {
    let mut parts = match expect_raw(reply)? {
        RawReply::Array(parts) => parts,
        other => {
            return Err(CacheError::Decode(format!(
                "expected a [cursor, members] pair, got {:?}",
                other
            )));
        }
    };
    if parts.len() != 2 {
        return Err(CacheError::Decode(format!(
            "expected a [cursor, members] pair, got {} elements",
            parts.len()
        )));
    }

    let batch = parts.pop();
    let cursor = match parts.pop() {
        Some(RawReply::Bulk(text)) => text
            .parse::<u64>()
            .map_err(|e| CacheError::Decode(format!("invalid cursor '{}': {}", text, e)))?,
        Some(RawReply::Int(n)) => u64::try_from(n)
            .map_err(|_| CacheError::Decode(format!("negative cursor {}", n)))?,
        other => {
            return Err(CacheError::Decode(format!(
                "expected a cursor, got {:?}",
                other
            )));
        }
    };
    let members = match batch {
        Some(RawReply::Array(items)) => bulk_strings(items)?,
        Some(RawReply::Nil) | None => Vec::new(),
        Some(other) => {
            return Err(CacheError::Decode(format!(
                "expected a member batch, got {:?}",
                other
            )));
        }
    };

    Ok(ScanPage { cursor, members })
}
