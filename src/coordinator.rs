//! Coordinator loop: initializes shards, announces map tasks, waits for M
//! completions, announces reduce tasks, waits for R completions, merges
//! final output. Grounded in `original_source/mapreduce/master.go`'s
//! `Node`/`runMaster`/`GetNextTask`, and in the teacher's `controller.rs`
//! for the overall run/clean-up shape.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tarpc::context;
use tarpc::server::{BaseChannel, Channel};
use tokio::sync::{Mutex, Notify};
use tarpc::tokio_serde::formats::Bincode;

use crate::config::{bind_address, data_address};
use crate::error::{MrError, Phase, PhaseError};
use crate::fetch::shard_url;
use crate::http_server;
use crate::naming;
use crate::partition;
use crate::rpc::{Coordination, MapTask, ReduceTask, Task, TaskSource};

/// Shared coordinator state. Cloned (cheaply, via the inner `Arc`) once per
/// inbound RPC connection, the way the xzhseh-MapReduce-rs reference
/// clones its `Coordinator` into each tarpc channel.
#[derive(Clone)]
pub struct CoordinatorHandle(Arc<State>);

struct State {
    m: usize,
    r: usize,
    map_tasks: Vec<MapTask>,
    /// Built once the map phase closes; empty until then.
    reduce_tasks: Mutex<Vec<ReduceTask>>,

    workers: Mutex<HashSet<String>>,
    completion: Mutex<HashMap<usize, String>>,
    completion_changed: Notify,

    map_cursor: Mutex<usize>,
    reduce_cursor: Mutex<usize>,
    map_phase_closed: Mutex<bool>,
}

impl CoordinatorHandle {
    fn new(m: usize, r: usize, map_tasks: Vec<MapTask>) -> CoordinatorHandle {
        CoordinatorHandle(Arc::new(State {
            m,
            r,
            map_tasks,
            reduce_tasks: Mutex::new(Vec::new()),
            workers: Mutex::new(HashSet::new()),
            completion: Mutex::new(HashMap::new()),
            completion_changed: Notify::new(),
            map_cursor: Mutex::new(0),
            reduce_cursor: Mutex::new(0),
            map_phase_closed: Mutex::new(false),
        }))
    }

    /// Blocks until exactly `count` completions have been recorded,
    /// snapshotting and clearing the completion index in one critical
    /// section (spec.md §4.F steps 6 and 9; §9's "a reader may observe a
    /// transient value; a rewrite must guard the read").
    async fn wait_for_completions(&self, count: usize) -> HashMap<usize, String> {
        loop {
            let changed = self.0.completion_changed.notified();
            {
                let mut completion = self.0.completion.lock().await;
                if completion.len() >= count {
                    return std::mem::take(&mut *completion);
                }
            }
            changed.await;
        }
    }

    async fn registered_workers(&self) -> Vec<String> {
        self.0.workers.lock().await.iter().cloned().collect()
    }
}

#[tarpc::server]
impl Coordination for CoordinatorHandle {
    async fn get_next_task(self, _: context::Context, prev: TaskSource) -> Task {
        self.0.workers.lock().await.insert(prev.source.clone());

        if prev.task >= 0 {
            let mut completion = self.0.completion.lock().await;
            completion.insert(prev.task as usize, prev.source.clone());
            drop(completion);
            self.0.completion_changed.notify_waiters();
        }

        // Lock order: map cursor before reduce cursor, consistently, so two
        // concurrent callers can never deadlock against each other.
        let mut map_cursor = self.0.map_cursor.lock().await;
        let mut reduce_cursor = self.0.reduce_cursor.lock().await;

        if *map_cursor < self.0.m {
            let task = self.0.map_tasks[*map_cursor].clone();
            *map_cursor += 1;
            return Task::Map(task);
        }

        let map_phase_closed = *self.0.map_phase_closed.lock().await;
        if map_phase_closed && *reduce_cursor < self.0.r {
            let reduce_tasks = self.0.reduce_tasks.lock().await;
            let task = reduce_tasks[*reduce_cursor].clone();
            *reduce_cursor += 1;
            return Task::Reduce(task);
        }

        Task::None
    }

    async fn close(self, _: context::Context) {
        // Workers never call Close on themselves; this arm exists only to
        // satisfy the shared service trait. The coordinator calls `close`
        // on workers, never the other way around.
    }
}

struct TempDir(PathBuf);

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

/// Runs a complete coordination job: split, map phase, reduce phase,
/// final merge, and `Close` broadcast. Returns once the target file has
/// been written.
pub async fn run(
    rpc_addr: &str,
    port: u16,
    source: &Path,
    target: &Path,
    tmp: PathBuf,
    m: usize,
    r: usize,
) -> Result<(), PhaseError> {
    std::fs::create_dir_all(&tmp).map_err(|e| PhaseError::new(Phase::Split, e.into()))?;
    let tmp_guard = TempDir(tmp.clone());

    tracing::info!("splitting {} into {} map shard(s)", source.display(), m);
    partition::split(source, &tmp, naming::map_source_file, m)
        .map_err(|e| PhaseError::new(Phase::Split, e))?;

    let data_port: u16 = data_address(rpc_addr)
        .map_err(|e| PhaseError::new(Phase::Split, e))?
        .rsplit_once(':')
        .and_then(|(_, p)| p.parse().ok())
        .ok_or_else(|| {
            PhaseError::new(
                Phase::Split,
                MrError::Protocol(format!("bad data address derived from {}", rpc_addr)),
            )
        })?;
    http_server::serve(bind_address(data_port), tmp.clone())
        .await
        .map_err(|e| PhaseError::new(Phase::Split, e))?;

    let map_tasks: Vec<MapTask> = (0..m)
        .map(|i| MapTask {
            m,
            r,
            n: i,
            source_host: rpc_addr.to_string(),
        })
        .collect();

    let coordinator = CoordinatorHandle::new(m, r, map_tasks);
    start_rpc_server(bind_address(port), coordinator.clone())
        .await
        .map_err(|e| PhaseError::new(Phase::Split, e))?;

    tracing::info!("waiting for {} map completion(s)", m);
    let map_hosts = coordinator.wait_for_completions(m).await;

    let mut reduce_tasks = Vec::with_capacity(r);
    let source_hosts: Vec<String> = (0..m)
        .map(|i| map_hosts.get(&i).cloned().unwrap_or_default())
        .collect();
    for j in 0..r {
        reduce_tasks.push(ReduceTask {
            m,
            r,
            n: j,
            source_hosts: source_hosts.clone(),
        });
    }
    *coordinator.0.reduce_tasks.lock().await = reduce_tasks;
    *coordinator.0.map_phase_closed.lock().await = true;

    tracing::info!("map phase closed, waiting for {} reduce completion(s)", r);
    let reduce_hosts = coordinator.wait_for_completions(r).await;

    let mut urls = Vec::with_capacity(r);
    for j in 0..r {
        let host = reduce_hosts.get(&j).ok_or_else(|| {
            PhaseError::new(
                Phase::Merge,
                MrError::Protocol(format!("no host reported for reduce task {}", j)),
            )
        })?;
        urls.push(shard_url(host, &naming::reduce_output_file(j)).map_err(|e| PhaseError::new(Phase::Merge, e))?);
    }
    let scratch = tmp.join(naming::FINAL_TEMP_FILE);
    tracing::info!("merging {} reduce output(s) into {}", r, target.display());
    partition::merge(&urls, target, &scratch)
        .await
        .map_err(|e| PhaseError::new(Phase::Merge, e))?;

    broadcast_close(&coordinator).await;

    drop(tmp_guard);
    Ok(())
}

async fn start_rpc_server(addr: SocketAddr, coordinator: CoordinatorHandle) -> Result<(), MrError> {
    let listener = tarpc::serde_transport::tcp::listen(addr, Bincode::default)
        .await
        .map_err(|e| MrError::Network(format!("binding RPC server on {}: {}", addr, e)))?;

    tokio::spawn(async move {
        use futures::StreamExt;
        listener
            .filter_map(|r| async { r.ok() })
            .map(BaseChannel::with_defaults)
            .for_each_concurrent(None, |channel| {
                let coordinator = coordinator.clone();
                async move {
                    channel.execute(coordinator.serve()).await;
                }
            })
            .await;
    });
    Ok(())
}

async fn broadcast_close(coordinator: &CoordinatorHandle) {
    for worker in coordinator.registered_workers().await {
        if let Err(e) = call_close(&worker).await {
            tracing::warn!("worker {} unresponsive to Close: {}", worker, e);
        }
    }
}

async fn call_close(addr: &str) -> Result<(), MrError> {
    let socket_addr: SocketAddr = addr
        .parse()
        .map_err(|_| MrError::Protocol(format!("bad worker address: {}", addr)))?;
    let transport = tarpc::serde_transport::tcp::connect(socket_addr, Bincode::default)
        .await
        .map_err(|e| MrError::Network(format!("dialing {}: {}", addr, e)))?;
    let client = crate::rpc::CoordinationClient::new(tarpc::client::Config::default(), transport).spawn();
    client
        .close(context::current())
        .await
        .map_err(|e| MrError::Network(format!("calling Close on {}: {}", addr, e)))
}
