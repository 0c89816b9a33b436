use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use rand::seq::IteratorRandom;

use crate::backend::{BackendConnector, SetBackend};
use crate::command::{SetCommand, SetOp};
use crate::config::{CacheConfig, Endpoint};
use crate::error::{CacheError, CacheResult};
use crate::reply::RawReply;

const DEFAULT_SCAN_COUNT: usize = 10;

/// Process-local set store with the same command semantics as the real one.
///
/// `InMemorySetBackend` is meant for tests and local development. Sets are
/// kept sorted so scans page deterministically, and a set whose last member
/// is removed or popped disappears along with its key.
///
/// A failure can be injected with [`fail_with`](Self::fail_with); every
/// command then errors with that message until
/// [`clear_failure`](Self::clear_failure) is called.
///
/// # Example
///
/// ```rust
/// use setcache_core::{InMemorySetBackend, SetBackend, SetCommand, SetOp, RawReply};
///
/// # tokio_test::block_on(async {
/// let backend = InMemorySetBackend::new();
/// let add = SetCommand::new(SetOp::AddMembers, "k").args(["1", "2", "2"]);
/// assert_eq!(backend.execute(&add).await.unwrap(), RawReply::Int(2));
/// # });
/// ```
#[derive(Clone, Default)]
pub struct InMemorySetBackend {
    sets: Arc<RwLock<HashMap<String, BTreeSet<String>>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl InMemorySetBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following command fail with `message`
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = Some(message.into());
        }
    }

    pub fn clear_failure(&self) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = None;
        }
    }

    /// Whether a key currently holds a set
    pub fn contains_key(&self, key: &str) -> bool {
        self.sets
            .read()
            .map(|sets| sets.contains_key(key))
            .unwrap_or(false)
    }

    fn injected_failure(&self) -> Option<String> {
        self.failure.read().ok().and_then(|f| f.clone())
    }

    fn apply(&self, command: &SetCommand) -> CacheResult<RawReply> {
        let mut sets = self.sets.write().map_err(|e| CacheError::CommandFailed {
            command: command.op.command().to_string(),
            message: format!("Lock poisoned: {}", e),
        })?;
        let key = command.key.as_str();
        let args = command.args.as_slice();

        match command.op {
            SetOp::AddMembers => {
                require_args(command, 1, None)?;
                let set = sets.entry(key.to_string()).or_default();
                let added = args.iter().filter(|m| set.insert(m.to_string())).count();
                Ok(RawReply::Int(added as i64))
            }
            SetOp::Cardinality => {
                require_args(command, 0, Some(0))?;
                Ok(RawReply::Int(sets.get(key).map_or(0, |s| s.len() as i64)))
            }
            SetOp::IsMember => {
                require_args(command, 1, Some(1))?;
                let present = sets.get(key).is_some_and(|s| s.contains(&args[0]));
                Ok(RawReply::Int(i64::from(present)))
            }
            SetOp::AllMembers => {
                require_args(command, 0, Some(0))?;
                let members = sets.get(key).cloned().unwrap_or_default();
                Ok(RawReply::bulk_array(members))
            }
            SetOp::PopRandom => {
                require_args(command, 0, Some(1))?;
                let count = match args.first() {
                    Some(raw) => Some(parse_count(command, raw)?),
                    None => None,
                };
                let popped = match sets.get_mut(key) {
                    Some(set) => {
                        let amount = count.unwrap_or(1).min(set.len());
                        let picked: Vec<String> = set
                            .iter()
                            .cloned()
                            .choose_multiple(&mut rand::rng(), amount);
                        for member in &picked {
                            set.remove(member);
                        }
                        picked
                    }
                    None => Vec::new(),
                };
                remove_if_empty(&mut sets, key);

                Ok(match count {
                    Some(_) => RawReply::bulk_array(popped),
                    None => popped
                        .into_iter()
                        .next()
                        .map_or(RawReply::Nil, RawReply::Bulk),
                })
            }
            SetOp::RemoveMembers => {
                require_args(command, 1, None)?;
                let removed = match sets.get_mut(key) {
                    Some(set) => args.iter().filter(|m| set.remove(m.as_str())).count(),
                    None => 0,
                };
                remove_if_empty(&mut sets, key);
                Ok(RawReply::Int(removed as i64))
            }
            SetOp::ScanCursor => {
                require_args(command, 1, None)?;
                scan(command, sets.get(key))
            }
        }
    }
}

fn command_error(command: &SetCommand, message: impl Into<String>) -> CacheError {
    CacheError::CommandFailed {
        command: command.op.command().to_string(),
        message: message.into(),
    }
}

fn require_args(command: &SetCommand, min: usize, max: Option<usize>) -> CacheResult<()> {
    let n = command.args.len();
    if n < min || max.is_some_and(|max| n > max) {
        return Err(command_error(
            command,
            format!(
                "ERR wrong number of arguments for '{}' command",
                command.op.command().to_lowercase()
            ),
        ));
    }
    Ok(())
}

fn parse_count(command: &SetCommand, raw: &str) -> CacheResult<usize> {
    raw.parse::<usize>()
        .map_err(|_| command_error(command, "ERR value is out of range, must be positive"))
}

fn remove_if_empty(sets: &mut HashMap<String, BTreeSet<String>>, key: &str) {
    if sets.get(key).is_some_and(BTreeSet::is_empty) {
        sets.remove(key);
    }
}

fn scan(command: &SetCommand, set: Option<&BTreeSet<String>>) -> CacheResult<RawReply> {
    let cursor: usize = command.args[0]
        .parse()
        .map_err(|_| command_error(command, "ERR invalid cursor"))?;

    let mut pattern = None;
    let mut count = DEFAULT_SCAN_COUNT;
    let mut rest = command.args[1..].iter();
    while let Some(flag) = rest.next() {
        let value = rest
            .next()
            .ok_or_else(|| command_error(command, "ERR syntax error"))?;
        match flag.to_ascii_uppercase().as_str() {
            "MATCH" => pattern = Some(value.as_str()),
            "COUNT" => {
                count = parse_count(command, value)?;
                if count == 0 {
                    return Err(command_error(command, "ERR syntax error"));
                }
            }
            _ => return Err(command_error(command, "ERR syntax error")),
        }
    }

    let Some(set) = set else {
        return Ok(scan_reply(0, Vec::new()));
    };

    let batch: Vec<String> = set
        .iter()
        .skip(cursor)
        .take(count)
        .filter(|m| pattern.is_none_or(|p| glob_match(p, m)))
        .cloned()
        .collect();
    let next = cursor.saturating_add(count);
    let next = if next >= set.len() { 0 } else { next };

    Ok(scan_reply(next, batch))
}

fn scan_reply(cursor: usize, members: Vec<String>) -> RawReply {
    RawReply::Array(vec![
        RawReply::Bulk(cursor.to_string()),
        RawReply::bulk_array(members),
    ])
}

/// Glob matching with `*` and `?`
fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((star_pi, star_ti)) = star {
            pi = star_pi + 1;
            ti = star_ti + 1;
            star = Some((star_pi, star_ti + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|&c| c == '*')
}

#[async_trait]
impl SetBackend for InMemorySetBackend {
    async fn execute(&self, command: &SetCommand) -> CacheResult<RawReply> {
        if let Some(message) = self.injected_failure() {
            return Err(command_error(command, message));
        }
        self.apply(command)
    }

    fn name(&self) -> &'static str {
        "in-memory"
    }
}

/// Connector that hands out a shared [`InMemorySetBackend`]
#[derive(Clone, Default)]
pub struct InMemoryConnector {
    backend: InMemorySetBackend,
    refuse: Option<String>,
}

impl InMemoryConnector {
    pub fn new(backend: InMemorySetBackend) -> Self {
        Self {
            backend,
            refuse: None,
        }
    }

    /// A connector whose every connect attempt fails
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            backend: InMemorySetBackend::new(),
            refuse: Some(reason.into()),
        }
    }

    pub fn backend(&self) -> &InMemorySetBackend {
        &self.backend
    }
}

#[async_trait]
impl BackendConnector for InMemoryConnector {
    async fn connect(
        &self,
        _endpoint: &Endpoint,
        _config: &CacheConfig,
    ) -> CacheResult<Arc<dyn SetBackend>> {
        match &self.refuse {
            Some(reason) => Err(CacheError::ConnectionFailed(reason.clone())),
            None => Ok(Arc::new(self.backend.clone())),
        }
    }
}
