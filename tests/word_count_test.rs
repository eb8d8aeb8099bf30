//! End-to-end word-count run: one coordinator and two workers, all in
//! process, talking over real loopback TCP sockets.

use std::sync::Arc;

use shufflemr::closure_mr::ClosureMapReduce;
use shufflemr::pair::Pair;
use shufflemr::shard_store::ShardStore;
use shufflemr::{coordinator, worker};

use tempfile::tempdir;

fn word_count_job() -> ClosureMapReduce {
    ClosureMapReduce::new(
        Arc::new(|_key, value, out| {
            Box::pin(async move {
                for word in value.split_whitespace() {
                    if out.send(Pair::new(word.to_string(), "1".to_string())).await.is_err() {
                        break;
                    }
                }
                Ok(())
            })
        }),
        Arc::new(|_key, mut values, out| {
            Box::pin(async move {
                let mut total: i64 = 0;
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
async fn word_count_end_to_end() {
    let root = tempdir().unwrap();

    let source_path = root.path().join("source.sqlite3");
    let target_path = root.path().join("target.sqlite3");
    {
        let source = ShardStore::create(&source_path).unwrap();
        source.insert("line0", "the quick brown fox").unwrap();
        source.insert("line1", "the lazy dog").unwrap();
        source.insert("line2", "the fox jumps").unwrap();
        source.insert("line3", "the dog barks").unwrap();
    }

    let coordinator_port = 23410;
    let coordinator_addr = format!("127.0.0.1:{}", coordinator_port);
    let coordinator_tmp = root.path().join("coordinator_tmp");

    let coordinator_addr_for_run = coordinator_addr.clone();
    let source_path_for_run = source_path.clone();
    let target_path_for_run = target_path.clone();
    let coordinator_handle = tokio::spawn(async move {
        coordinator::run(
            &coordinator_addr_for_run,
            coordinator_port,
            &source_path_for_run,
            &target_path_for_run,
            coordinator_tmp,
            2,
            2,
        )
        .await
    });

    // Give the coordinator's listeners a moment to bind before workers dial
    // in; a worker's first poll simply fails and there's no retry wired up
    // in this test harness.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;

    let worker_a_addr = coordinator_addr.clone();
    let worker_a_tmp = root.path().join("worker_a_tmp");
    let worker_a = tokio::spawn(async move {
        worker::run(&worker_a_addr, 23420, worker_a_tmp, word_count_job()).await
    });

    let worker_b_addr = coordinator_addr.clone();
    let worker_b_tmp = root.path().join("worker_b_tmp");
    let worker_b = tokio::spawn(async move {
        worker::run(&worker_b_addr, 23430, worker_b_tmp, word_count_job()).await
    });

    let coordinator_result = tokio::time::timeout(std::time::Duration::from_secs(30), coordinator_handle)
        .await
        .expect("coordinator timed out")
        .expect("coordinator task panicked");
    coordinator_result.expect("coordinator run failed");

    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), worker_a).await;
    let _ = tokio::time::timeout(std::time::Duration::from_secs(5), worker_b).await;

    let target = ShardStore::open(&target_path).unwrap();
    let mut rows = target.scan().unwrap();
    rows.sort();

    let counts: std::collections::HashMap<String, i64> = rows
        .into_iter()
        .map(|p| (p.key, p.value.parse::<i64>().unwrap()))
        .collect();

    assert_eq!(counts.get("the").copied(), Some(4));
    assert_eq!(counts.get("fox").copied(), Some(2));
    assert_eq!(counts.get("dog").copied(), Some(2));
    assert_eq!(counts.get("quick").copied(), Some(1));
    assert_eq!(counts.get("lazy").copied(), Some(1));
    assert_eq!(counts.get("jumps").copied(), Some(1));
    assert_eq!(counts.get("barks").copied(), Some(1));
}
