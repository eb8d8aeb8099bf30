//! Executes one map task (spec.md §4.H): fetch the input shard, run the
//! job's `map` over every row, and fan output into R local shard files
//! bucketed by `fnv::bucket`.

use std::path::Path;

use tokio::sync::mpsc;

use crate::error::MrError;
use crate::fetch::{download, shard_url};
use crate::fnv;
use crate::mapreduce::MapReduce;
use crate::naming;
use crate::rpc::MapTask;
use crate::shard_store::ShardStore;

pub async fn run<J: MapReduce>(task: &MapTask, tmp: &Path, job: &J) -> Result<(), MrError> {
    let input_path = tmp.join(naming::map_input_file(task.n));
    let url = shard_url(&task.source_host, &naming::map_source_file(task.n))?;
    download(&url, &input_path).await?;

    let input = ShardStore::open(&input_path)?;
    let rows = input.scan()?;

    let mut outputs = Vec::with_capacity(task.r);
    for j in 0..task.r {
        outputs.push(ShardStore::create(tmp.join(naming::map_output_file(task.n, j)))?);
    }

    for row in &rows {
        run_one(job, &row.key, &row.value, &mut outputs, task.r).await?;
    }

    tracing::debug!(
        "map task {} processed {} row(s) into {} bucket(s)",
        task.n,
        rows.len(),
        task.r
    );
    Ok(())
}

async fn run_one<J: MapReduce>(
    job: &J,
    key: &str,
    value: &str,
    outputs: &mut [ShardStore],
    r: usize,
) -> Result<(), MrError> {
    let (tx, mut rx) = mpsc::channel(32);
    let job = job.clone();
    let key_owned = key.to_string();
    let value_owned = value.to_string();

    let map_fut = async move { job.map(&key_owned, &value_owned, tx).await };
    let drain_fut = async {
        while let Some(pair) = rx.recv().await {
            let bucket = fnv::bucket(&pair.key, r);
            outputs[bucket].insert(&pair.key, &pair.value)?;
        }
        Ok::<(), MrError>(())
    };

    let (map_result, drain_result) = tokio::join!(map_fut, drain_fut);
    map_result?;
    drain_result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure_mr::ClosureMapReduce;
    use crate::pair::Pair;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn word_count_job() -> ClosureMapReduce {
        ClosureMapReduce::new(
            Arc::new(|_key, value, out| {
                Box::pin(async move {
                    for word in value.split_whitespace() {
                        out.send(Pair::new(word.to_string(), "1".to_string()))
                            .await
                            .ok();
                    }
                    Ok(())
                })
            }),
            Arc::new(|_key, mut values, _out| {
                Box::pin(async move {
                    while values.recv().await.is_some() {}
                    Ok(())
                })
            }),
        )
    }

    #[tokio::test]
    async fn map_task_fans_output_into_r_buckets() {
        let coord_dir = tempdir().unwrap();
        let worker_dir = tempdir().unwrap();

        let source = ShardStore::create(coord_dir.path().join("map_0_source.db")).unwrap();
        source.insert("line1", "the quick brown fox").unwrap();
        source.insert("line2", "the lazy dog").unwrap();
        drop(source);

        crate::http_server::serve(
            crate::config::bind_address(18080),
            coord_dir.path().to_path_buf(),
        )
        .await
        .unwrap();

        let task = MapTask {
            m: 1,
            r: 3,
            n: 0,
            source_host: "127.0.0.1:18079".to_string(),
        };
        run(&task, worker_dir.path(), &word_count_job()).await.unwrap();

        let mut total = 0;
        for j in 0..3 {
            let store = ShardStore::open(worker_dir.path().join(naming::map_output_file(0, j))).unwrap();
            total += store.scan().unwrap().len();
        }
        assert_eq!(total, 7);
    }
}
