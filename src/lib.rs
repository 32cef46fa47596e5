//! sluice: a database-backed work scheduler with checkpoint barriers.
//!
//! Work is modeled as [`Item`]s grouped into [`Partition`]s. Peer
//! [`Worker`]s compete for partition leases stored in a shared relational
//! database, poll for ready items in the partitions they hold, and dispatch
//! each payload to a pluggable [`Processor`]. Partitions advance through
//! ordered gates that act as barriers: a partition only moves to gate G+1
//! once every item at gate G has reached a terminal state, which gives a
//! queryable, persistent alternative to a pure message queue, with retries,
//! error tracking, and checkpointing built in.
//!
//! ## Key pieces
//!
//! - [`repo::Repo`]: the persistence capability set, with conditional
//!   (version-predicated) saves. [`PgRepo`] is the production backend;
//!   [`SqliteRepo`] backs local mode and tests.
//! - [`Worker`]: lease acquisition, per-partition watchers, and the
//!   dispatcher pool, driven by a cancellation token.
//! - [`HttpProcessor`]: the reference backend, POSTing payloads to a JSON
//!   service.
//! - [`health`]: the HTTP liveness surface.
//!
//! Processing is at-least-once; backends must tolerate duplicate
//! dispatches.

pub mod health;
pub mod http_processor;
pub mod model;
pub mod processor;
pub mod repo;
pub mod worker;

pub use http_processor::HttpProcessor;
pub use model::{Item, Partition, Status};
pub use processor::{ProcessError, Processor, ProcessorResponse};
pub use repo::{PgRepo, Repo, RepoError, RepoResult, SqliteRepo, TxFunc};
pub use worker::{Worker, WorkerConfig};
