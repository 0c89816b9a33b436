//! Set-collection commands and their per-operation reply policy

use std::fmt;

use serde::Serialize;

use crate::error::{CacheError, CacheResult};

/// Whether an operation's reply is parsed before it is returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyPolicy {
    /// Integers become numbers and members are decoded as JSON
    Parse,
    /// Member strings and cursors are returned as the store sent them
    PassThrough,
}

/// The set operations exposed by [`SetCache`](crate::SetCache)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetOp {
    AddMembers,
    Cardinality,
    IsMember,
    AllMembers,
    PopRandom,
    RemoveMembers,
    ScanCursor,
}

impl SetOp {
    pub const ALL: [SetOp; 7] = [
        SetOp::AddMembers,
        SetOp::Cardinality,
        SetOp::IsMember,
        SetOp::AllMembers,
        SetOp::PopRandom,
        SetOp::RemoveMembers,
        SetOp::ScanCursor,
    ];

    /// Name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            SetOp::AddMembers => "add_members",
            SetOp::Cardinality => "cardinality",
            SetOp::IsMember => "is_member",
            SetOp::AllMembers => "all_members",
            SetOp::PopRandom => "pop_random",
            SetOp::RemoveMembers => "remove_members",
            SetOp::ScanCursor => "scan",
        }
    }

    /// Store command issued for this operation
    pub fn command(&self) -> &'static str {
        match self {
            SetOp::AddMembers => "SADD",
            SetOp::Cardinality => "SCARD",
            SetOp::IsMember => "SISMEMBER",
            SetOp::AllMembers => "SMEMBERS",
            SetOp::PopRandom => "SPOP",
            SetOp::RemoveMembers => "SREM",
            SetOp::ScanCursor => "SSCAN",
        }
    }

    /// Enumeration and scan hand back raw sequences; everything else is parsed
    pub fn reply_policy(&self) -> ReplyPolicy {
        match self {
            SetOp::AllMembers | SetOp::ScanCursor => ReplyPolicy::PassThrough,
            SetOp::AddMembers
            | SetOp::Cardinality
            | SetOp::IsMember
            | SetOp::PopRandom
            | SetOp::RemoveMembers => ReplyPolicy::Parse,
        }
    }

    /// Commands that change the set
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            SetOp::AddMembers | SetOp::PopRandom | SetOp::RemoveMembers
        )
    }
}

impl fmt::Display for SetOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A backend-agnostic command: operation, key and encoded arguments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetCommand {
    pub op: SetOp,
    pub key: String,
    pub args: Vec<String>,
}

impl SetCommand {
    pub fn new(op: SetOp, key: impl Into<String>) -> Self {
        Self {
            op,
            key: key.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl fmt::Display for SetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.op.command(), self.key)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Optional `MATCH` and `COUNT` arguments for a cursor scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub pattern: Option<String>,
    pub count: Option<usize>,
}

impl ScanOptions {
    pub fn with_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub(crate) fn to_args(&self, cursor: u64) -> Vec<String> {
        let mut args = vec![cursor.to_string()];
        if let Some(pattern) = &self.pattern {
            args.push("MATCH".to_string());
            args.push(pattern.clone());
        }
        if let Some(count) = self.count {
            args.push("COUNT".to_string());
            args.push(count.to_string());
        }
        args
    }
}

/// Encode a member as JSON text, the form it is stored in
pub fn encode_member<V: Serialize + ?Sized>(value: &V) -> CacheResult<String> {
    serde_json::to_string(value).map_err(|e| CacheError::Encode(e.to_string()))
}

/// Encode every member of a slice
pub fn encode_members<V: Serialize>(values: &[V]) -> CacheResult<Vec<String>> {
    values.iter().map(encode_member).collect()
}
