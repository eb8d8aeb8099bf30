//! Splits the source table into M map shards, and merges a sequence of
//! remote shard URLs into one destination (the shuffle's two directions).

use std::path::{Path, PathBuf};

use crate::error::MrError;
use crate::fetch::download;
use crate::shard_store::ShardStore;

/// Splits `source` into `m` shards named by `name_fn(i)` under `out_dir`,
/// round-robin: row `k` goes to shard `k mod m`. Fails with
/// `InsufficientData` if `source` holds fewer than `m` rows.
pub fn split<F: Fn(usize) -> String>(
    source: &Path,
    out_dir: &Path,
    name_fn: F,
    m: usize,
) -> Result<Vec<PathBuf>, MrError> {
    let input = ShardStore::open(source)?;
    let rows = input.scan()?;

    let mut outputs = Vec::with_capacity(m);
    let mut paths = Vec::with_capacity(m);
    for i in 0..m {
        let path = out_dir.join(name_fn(i));
        outputs.push(ShardStore::create(&path)?);
        paths.push(path);
    }

    let mut count = 0;
    for (i, row) in rows.iter().enumerate() {
        outputs[i % m].insert(&row.key, &row.value)?;
        count += 1;
    }

    if count < m {
        return Err(MrError::InsufficientData(format!(
            "source has {} row(s), need at least {} to feed {} map task(s)",
            count, m, m
        )));
    }
    Ok(paths)
}

/// Downloads each URL in order into `scratch`, attaches it into `dest`
/// (creating `dest` empty first if it doesn't exist), and deletes the
/// scratch file. Used both by the reduce executor (merging M map outputs)
/// and the coordinator (merging R reduce outputs into the final target).
pub async fn merge(urls: &[String], dest: &Path, scratch: &Path) -> Result<(), MrError> {
    let dest_store = if dest.exists() {
        ShardStore::open(dest)?
    } else {
        ShardStore::create(dest)?
    };

    for url in urls {
        tracing::debug!("merging {} into {}", url, dest.display());
        download(url, scratch).await?;
        dest_store.attach_and_append(scratch)?;
    }
    Ok(())
}
