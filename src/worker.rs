//! Worker poll loop (spec.md §4.G): repeatedly call `GetNextTask`, run
//! whatever comes back, and report it done on the next call. Idles 2
//! seconds between polls that return `Task::None`, and stops once the
//! coordinator calls `Close`. Fail-stop: any executor error aborts the
//! process rather than being retried, per spec.md §9.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tarpc::context;
use tarpc::server::{BaseChannel, Channel};
use tarpc::tokio_serde::formats::Bincode;

use crate::config::{bind_address, data_address, own_address};
use crate::error::{MrError, Phase, PhaseError};
use crate::http_server;
use crate::map_exec;
use crate::mapreduce::MapReduce;
use crate::reduce_exec;
use crate::rpc::{Coordination, CoordinationClient, Task, TaskSource};

const IDLE_RETRY: Duration = Duration::from_secs(2);

#[derive(Clone)]
struct WorkerHandle(Arc<AtomicBool>);

#[tarpc::server]
impl Coordination for WorkerHandle {
    /// A worker never assigns tasks; this arm only exists because the
    /// service trait is shared between coordinator and worker.
    async fn get_next_task(self, _: context::Context, _prev: TaskSource) -> Task {
        Task::None
    }

    async fn close(self, _: context::Context) {
        tracing::info!("received Close from coordinator");
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Runs a worker against `coordinator_addr` until `Close`d.
///
/// Errors are tagged with the phase active when they occurred: setup and
/// idle polling count as the map phase, since that's always the first
/// phase a freshly started worker will be asked to join.
pub async fn run<J: MapReduce>(
    coordinator_addr: &str,
    port: u16,
    tmp: PathBuf,
    job: J,
) -> Result<(), PhaseError> {
    std::fs::create_dir_all(&tmp).map_err(|e| PhaseError::new(Phase::Map, e.into()))?;

    let own_addr = own_address(port).map_err(|e| PhaseError::new(Phase::Map, e))?;
    let data_port: u16 = data_address(&own_addr)
        .map_err(|e| PhaseError::new(Phase::Map, e))?
        .rsplit_once(':')
        .and_then(|(_, p)| p.parse().ok())
        .ok_or_else(|| {
            PhaseError::new(
                Phase::Map,
                MrError::Protocol(format!("bad data address derived from {}", own_addr)),
            )
        })?;
    http_server::serve(bind_address(data_port), tmp.clone())
        .await
        .map_err(|e| PhaseError::new(Phase::Map, e))?;

    let done = Arc::new(AtomicBool::new(false));
    start_rpc_server(bind_address(port), WorkerHandle(done.clone()))
        .await
        .map_err(|e| PhaseError::new(Phase::Map, e))?;

    let coordinator: SocketAddr = coordinator_addr.parse().map_err(|_| {
        PhaseError::new(
            Phase::Map,
            MrError::Protocol(format!("bad coordinator address: {}", coordinator_addr)),
        )
    })?;

    let mut prev_task: i64 = -1;
    let mut current_phase = Phase::Map;
    while !done.load(Ordering::SeqCst) {
        let task = poll(coordinator, &own_addr, prev_task)
            .await
            .map_err(|e| PhaseError::new(current_phase, e))?;
        match task {
            Task::Map(task) => {
                current_phase = Phase::Map;
                tracing::info!("running map task {}", task.n);
                let n = task.n;
                map_exec::run(&task, &tmp, &job)
                    .await
                    .map_err(|e| PhaseError::new(Phase::Map, e))?;
                prev_task = n as i64;
            }
            Task::Reduce(task) => {
                current_phase = Phase::Reduce;
                tracing::info!("running reduce task {}", task.n);
                let n = task.n;
                reduce_exec::run(&task, &tmp, &job)
                    .await
                    .map_err(|e| PhaseError::new(Phase::Reduce, e))?;
                prev_task = n as i64;
            }
            Task::None => {
                tokio::time::sleep(IDLE_RETRY).await;
            }
        }
    }
    Ok(())
}

async fn poll(coordinator: SocketAddr, own_addr: &str, prev_task: i64) -> Result<Task, MrError> {
    let transport = tarpc::serde_transport::tcp::connect(coordinator, Bincode::default)
        .await
        .map_err(|e| MrError::Network(format!("dialing coordinator at {}: {}", coordinator, e)))?;
    let client = CoordinationClient::new(tarpc::client::Config::default(), transport).spawn();
    client
        .get_next_task(
            context::current(),
            TaskSource {
                source: own_addr.to_string(),
                task: prev_task,
            },
        )
        .await
        .map_err(|e| MrError::Network(format!("calling GetNextTask: {}", e)))
}

async fn start_rpc_server(addr: SocketAddr, handle: WorkerHandle) -> Result<(), MrError> {
    let listener = tarpc::serde_transport::tcp::listen(addr, Bincode::default)
        .await
        .map_err(|e| MrError::Network(format!("binding worker RPC server on {}: {}", addr, e)))?;

    tokio::spawn(async move {
        use futures::StreamExt;
        listener
            .filter_map(|r| async { r.ok() })
            .map(BaseChannel::with_defaults)
            .for_each_concurrent(None, |channel| {
                let handle = handle.clone();
                async move {
                    channel.execute(handle.serve()).await;
                }
            })
            .await;
    });
    Ok(())
}
