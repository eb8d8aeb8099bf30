//! The `MapReduce` trait: the contract a user's job logic must honor.
//!
//! Generalizes the teacher's `MapReducer` trait (`mapreducer.rs`) from a
//! synchronous, in-process emitter to the streamed, channel-based contract
//! of spec.md §4.H/§4.I: `map`/`reduce` each receive a sink they must drain
//! to completion and then drop, which is how the executor knows the call
//! produced its last value.

use tokio::sync::mpsc;

use crate::error::MrError;
use crate::pair::Pair;

/// A type implementing user job logic. Cloned once per map/reduce task
/// invocation, mirroring the teacher's per-partition clone of `MapReducer`.
#[async_trait::async_trait]
pub trait MapReduce: Clone + Send + Sync + 'static {
    /// Processes one input row, emitting zero or more pairs on `out`.
    ///
    /// The executor will not advance to the next input row until this call
    /// returns, so `out` MUST be fully drained (dropped) before returning;
    /// that drop is the "end of output" signal from spec.md §4.H.
    async fn map(&self, key: &str, value: &str, out: mpsc::Sender<Pair>) -> Result<(), MrError>;

    /// Processes one key's group of values, emitting zero or more result
    /// values on `out`.
    ///
    /// `values` yields every value for `key` in the order the merged scan
    /// produced them. Dropping `out` signals "no further output" and lets
    /// the executor begin draining it into the output shard.
    async fn reduce(
        &self,
        key: &str,
        values: mpsc::Receiver<String>,
        out: mpsc::Sender<String>,
    ) -> Result<(), MrError>;
}
