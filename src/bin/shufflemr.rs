//! Binary entry point: parses the CLI, runs either the coordinator or a
//! worker, and reports a failing phase on exit. Grounded in the teacher's
//! `main.rs` role-dispatch shape, generalized from a thread-pool-bounded
//! single process into a coordinator/worker network role split.

use std::path::Path;
use std::sync::Arc;

use shufflemr::closure_mr::ClosureMapReduce;
use shufflemr::config::Cli;
use shufflemr::error::{Phase, PhaseError};
use shufflemr::pair::Pair;
use shufflemr::{coordinator, worker};

use clap::Parser;

/// A word-count job, the canonical example from spec.md §8 Scenario 1: map
/// splits each input value on whitespace and emits `(word, "1")`; reduce
/// sums the values for each word.
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

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), PhaseError> {
    let tmp = cli.tempdir();
    let job = word_count_job();

    if cli.master {
        let own_addr = shufflemr::config::own_address(cli.port)
            .map_err(|e| PhaseError::new(Phase::Split, e))?;
        coordinator::run(
            &own_addr,
            cli.port,
            Path::new(&cli.source),
            Path::new(&cli.target),
            tmp,
            cli.m,
            cli.r,
        )
        .await
    } else {
        let coordinator_addr = format!("{}:{}", cli.address, cli.port);
        worker::run(&coordinator_addr, cli.port, tmp, job).await
    }
}
