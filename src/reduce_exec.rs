//! Executes one reduce task (spec.md §4.I): pull bucket N from every map
//! output, merge them into one sorted input, group by key, and run the
//! job's `reduce` over each group.

use std::path::Path;

use tokio::sync::mpsc;

use crate::error::MrError;
use crate::fetch::shard_url;
use crate::mapreduce::MapReduce;
use crate::naming;
use crate::partition::merge;
use crate::rpc::ReduceTask;
use crate::shard_store::ShardStore;

pub async fn run<J: MapReduce>(task: &ReduceTask, tmp: &Path, job: &J) -> Result<(), MrError> {
    let urls: Result<Vec<String>, MrError> = task
        .source_hosts
        .iter()
        .enumerate()
        .map(|(i, host)| shard_url(host, &naming::map_output_file(i, task.n)))
        .collect();
    let urls = urls?;

    let input_path = tmp.join(naming::reduce_input_file(task.n));
    let scratch_path = tmp.join(naming::reduce_temp_file(task.n));
    merge(&urls, &input_path, &scratch_path).await?;

    let input = ShardStore::open(&input_path)?;
    let rows = input.scan_ordered_by_key()?;

    let output = ShardStore::create(tmp.join(naming::reduce_output_file(task.n)))?;

    let mut i = 0;
    let mut groups = 0;
    while i < rows.len() {
        let key = rows[i].key.clone();
        let mut j = i;
        let mut values = Vec::new();
        while j < rows.len() && rows[j].key == key {
            values.push(rows[j].value.clone());
            j += 1;
        }
        run_group(job, &key, values, &output).await?;
        groups += 1;
        i = j;
    }

    tracing::debug!("reduce task {} grouped {} row(s) into {} key(s)", task.n, rows.len(), groups);
    Ok(())
}

async fn run_group<J: MapReduce>(
    job: &J,
    key: &str,
    values: Vec<String>,
    output: &ShardStore,
) -> Result<(), MrError> {
    let (val_tx, val_rx) = mpsc::channel(32);
    let (out_tx, mut out_rx) = mpsc::channel(32);

    let job = job.clone();
    let key_for_reduce = key.to_string();
    let reduce_fut = async move { job.reduce(&key_for_reduce, val_rx, out_tx).await };

    let feed_fut = async move {
        for value in values {
            if val_tx.send(value).await.is_err() {
                break;
            }
        }
    };

    let key_for_drain = key.to_string();
    let drain_fut = async {
        while let Some(value) = out_rx.recv().await {
            output.insert(&key_for_drain, &value)?;
        }
        Ok::<(), MrError>(())
    };

    let (reduce_result, _, drain_result) = tokio::join!(reduce_fut, feed_fut, drain_fut);
    reduce_result?;
    drain_result?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure_mr::ClosureMapReduce;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn sum_counts_job() -> ClosureMapReduce {
        ClosureMapReduce::new(
            Arc::new(|_key, _value, _out| Box::pin(async move { Ok(()) })),
            Arc::new(|_key, mut values, out| {
                Box::pin(async move {
                    let mut total = 0i64;
                    while let Some(v) = values.recv().await {
                        total += v.parse::<i64>().unwrap_or(0);
                    }
                    out.send(total.to_string()).await.ok();
                    Ok(())
                })
            }),
        )
    }

    #[tokio::test]
    async fn reduce_task_groups_and_sums() {
        let source_dir = tempdir().unwrap();
        let worker_dir = tempdir().unwrap();

        let shard = ShardStore::create(source_dir.path().join("map_0_output_0.db")).unwrap();
        shard.insert("fox", "1").unwrap();
        shard.insert("dog", "1").unwrap();
        shard.insert("fox", "1").unwrap();
        drop(shard);

        crate::http_server::serve(
            crate::config::bind_address(18090),
            source_dir.path().to_path_buf(),
        )
        .await
        .unwrap();

        let task = ReduceTask {
            m: 1,
            r: 1,
            n: 0,
            source_hosts: vec!["127.0.0.1:18089".to_string()],
        };
        run(&task, worker_dir.path(), &sum_counts_job()).await.unwrap();

        let output = ShardStore::open(worker_dir.path().join(naming::reduce_output_file(0))).unwrap();
        let mut rows = output.scan().unwrap();
        rows.sort();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].key, "dog");
        assert_eq!(rows[0].value, "1");
        assert_eq!(rows[1].key, "fox");
        assert_eq!(rows[1].value, "2");
    }
}
