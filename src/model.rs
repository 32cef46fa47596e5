//! Persistent entities: partitions and the items they contain.
//!
//! A [`Partition`] is the unit of leasing and checkpointing; an [`Item`] is a
//! unit of dispatched work belonging to exactly one partition at one gate.
//! Both carry an optimistic-concurrency version column; every mutation flows
//! through a conditional save in the repository layer, so a worker whose
//! lease was stolen silently loses its next write instead of corrupting
//! state.

use std::fmt;

use chrono::{DateTime, Utc};
use tracing::error;

use crate::processor::ProcessError;

/// Lifecycle state shared by partitions and items.
///
/// `Unknown` is a zero sentinel and is never written by this crate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, sqlx::Type)]
#[repr(i32)]
pub enum Status {
    #[default]
    Unknown = 0,
    Available = 1,
    Complete = 2,
    Failed = 3,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Available => "Available",
            Self::Complete => "Complete",
            Self::Failed => "Failed",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The unit of work over which workers compete.
///
/// A gate is a checkpoint: every item under the partition must reach a
/// terminal status at the current gate before the gate is incremented, which
/// is how fan-in is expressed. The `(owner, until)` pair records the current
/// lease; `until` in the past means the lease is up for grabs regardless of
/// who owned it last.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Partition {
    pub id: String,
    pub version: i64,
    pub gate: i64,
    pub status: Status,
    pub owner: String,
    pub until: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Partition {
    /// A fresh, immediately leasable partition at gate 0.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            version: 0,
            gate: 0,
            status: Status::Available,
            owner: String::new(),
            until: DateTime::UNIX_EPOCH,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the lease window has passed.
    pub fn expired(&self) -> bool {
        self.until < Utc::now()
    }

    /// Whether this partition is still dispatchable by the lease holder.
    pub fn active(&self) -> bool {
        self.status == Status::Available && !self.expired()
    }
}

/// A work item, with the bookkeeping required for retries.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct Item {
    pub id: String,
    pub version: i64,
    pub partition_id: String,
    pub gate: i64,
    pub status: Status,
    pub retry_count: i64,
    pub error_messages: String,
    pub data: Vec<u8>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Item {
    /// A new available item at gate 0 with an opaque payload.
    pub fn new(id: impl Into<String>, partition_id: impl Into<String>, data: Vec<u8>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            version: 0,
            partition_id: partition_id.into(),
            gate: 0,
            status: Status::Available,
            retry_count: 0,
            error_messages: String::new(),
            data,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record a dispatch failure, and possibly move the item to `Failed`.
    ///
    /// The message is appended to `error_messages` unless it repeats the most
    /// recent one. The item fails when the error is non-retryable, or when
    /// `retry_count` exceeds `max_retries` (a negative `max_retries` disables
    /// the ceiling).
    pub fn record_failure(&mut self, err: &ProcessError, max_retries: i64) {
        error!(
            item_id = %self.id,
            partition_id = %self.partition_id,
            error = %err,
            "item dispatch failed"
        );
        self.retry_count += 1;
        let message = err.message();
        if self.error_messages.is_empty() {
            self.error_messages = message.to_string();
        } else if self.error_messages.rsplit('\n').next() != Some(message) {
            self.error_messages.push('\n');
            self.error_messages.push_str(message);
        }
        if !err.is_retryable() || (max_retries >= 0 && self.retry_count > max_retries) {
            self.status = Status::Failed;
        }
    }
}
