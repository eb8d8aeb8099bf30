//! Downloads a remote shard file to a local path. No retries: a transient
//! failure aborts the task and the caller decides what to do (spec.md
//! §4.C, §9).

use std::path::Path;

use crate::config::data_address;
use crate::error::MrError;

/// Fetches `url` and writes its body to `path`, overwriting any existing
/// file there.
pub async fn download<P: AsRef<Path>>(url: &str, path: P) -> Result<(), MrError> {
    let response = reqwest::get(url).await?;
    if !response.status().is_success() {
        return Err(MrError::Network(format!(
            "GET {} returned {}",
            url,
            response.status()
        )));
    }
    let bytes = response.bytes().await?;
    tokio::fs::write(path, &bytes).await?;
    Ok(())
}

/// Builds the URL a peer's HTTP shard server exposes `basename` at, given
/// the RPC address that peer is registered under.
pub fn shard_url(rpc_host: &str, basename: &str) -> Result<String, MrError> {
    Ok(format!("http://{}/data/{}", data_address(rpc_host)?, basename))
}
