//! A `MapReduce` built from plain async function pointers, for callers who
//! don't want to define a new type. Ported from the teacher's
//! `ClosureMapReducer`.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::error::MrError;
use crate::mapreduce::MapReduce;
use crate::pair::Pair;

type MapFn = Arc<
    dyn Fn(String, String, mpsc::Sender<Pair>) -> Pin<Box<dyn Future<Output = Result<(), MrError>> + Send>>
        + Send
        + Sync,
>;
type ReduceFn = Arc<
    dyn Fn(String, mpsc::Receiver<String>, mpsc::Sender<String>) -> Pin<Box<dyn Future<Output = Result<(), MrError>> + Send>>
        + Send
        + Sync,
>;

/// Wraps a pair of async closures as a `MapReduce` implementation.
#[derive(Clone)]
pub struct ClosureMapReduce {
    mapper: MapFn,
    reducer: ReduceFn,
}

impl ClosureMapReduce {
    pub fn new(mapper: MapFn, reducer: ReduceFn) -> ClosureMapReduce {
        ClosureMapReduce { mapper, reducer }
    }
}

#[async_trait::async_trait]
impl MapReduce for ClosureMapReduce {
    async fn map(&self, key: &str, value: &str, out: mpsc::Sender<Pair>) -> Result<(), MrError> {
        (self.mapper)(key.to_string(), value.to_string(), out).await
    }

    async fn reduce(
        &self,
        key: &str,
        values: mpsc::Receiver<String>,
        out: mpsc::Sender<String>,
    ) -> Result<(), MrError> {
        (self.reducer)(key.to_string(), values, out).await
    }
}
