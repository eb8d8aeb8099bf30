//! The task-assignment RPC: a single `GetNextTask` pull method plus a
//! `Close` termination signal, served over `tarpc`.
//!
//! Grounded in the `#[tarpc::service]` style used by the
//! `Clemens865-Phago_Project` reference files and in the task-shape from
//! `examples/other_examples/...xzhseh-MapReduce-rs...coordinator.rs.rs`,
//! adapted to the single-queue pull protocol of spec.md §4.E rather than
//! that reference's four-method (get_map_task/get_reduce_task/...) design.

use serde::{Deserialize, Serialize};

/// A worker's attestation of what it just finished, sent with every poll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSource {
    /// This worker's own `host:port`.
    pub source: String,
    /// The task number it just completed, or `-1` if it has none to report
    /// (first poll, or the previous poll returned no task).
    pub task: i64,
}

/// One map task: read `map_<N>_source.db` from `source_host`, fan out R ways.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapTask {
    pub m: usize,
    pub r: usize,
    pub n: usize,
    pub source_host: String,
}

/// One reduce task: merge bucket N from each of the M map outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReduceTask {
    pub m: usize,
    pub r: usize,
    pub n: usize,
    pub source_hosts: Vec<String>,
}

/// The sum type returned by `GetNextTask`. Tagged explicitly on the wire
/// (an `enum` serializes with its variant name/index, never an untyped
/// null) per spec.md §9's guidance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Task {
    Map(MapTask),
    Reduce(ReduceTask),
    None,
}

/// The RPC surface a coordinator exposes to its workers.
#[tarpc::service]
pub trait Coordination {
    /// Registers the caller, records completion of its previous task (if
    /// any), and returns the next task to run, or `Task::None` if nothing
    /// is currently assignable.
    async fn get_next_task(prev: TaskSource) -> Task;

    /// Tells the callee to stop polling and exit. Broadcast by the
    /// coordinator once the final merge has succeeded.
    async fn close() -> ();
}
