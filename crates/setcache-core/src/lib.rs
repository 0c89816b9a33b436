//! # Setcache Core
//!
//! Guarded set-collection operations over a single shared connection to a
//! set store.
//!
//! ## Components
//!
//! - **[SetCache]**: owns the connection handle and runs every operation
//!   through one guard that never lets a backend fault reach the caller
//! - **[ReconnectPolicy]**: the error classifier and backoff schedule handed
//!   to the transport
//! - **[SetBackend] / [BackendConnector]**: seams for the real store and for
//!   test doubles such as [InMemorySetBackend]
//!
//! Each operation declares whether its reply is parsed or passed through; see
//! [`SetOp::reply_policy`].

pub mod backend;
pub mod cache;
pub mod command;
pub mod config;
pub mod error;
pub mod health;
pub mod in_memory;
pub mod outcome;
pub mod policy;
pub mod reply;

pub use backend::{BackendConnector, SetBackend};
pub use cache::SetCache;
pub use command::{ReplyPolicy, ScanOptions, SetCommand, SetOp};
pub use config::{CacheConfig, Endpoint};
pub use error::{CacheError, CacheResult, ConfigError, ConfigResult};
pub use health::{CacheHealth, MetricsSnapshot, OperationMetrics};
pub use in_memory::{InMemoryConnector, InMemorySetBackend};
pub use outcome::OpOutcome;
pub use policy::{ReconnectPolicy, RetryDecision, backoff_delay, retry_strategy, should_reconnect};
pub use reply::{RawReply, Reply, ScanPage};
