//! Exposes a node's temp directory under `/data/`, so peers can fetch the
//! shard files it produces. Grounded in the axum router style of
//! `harborgrid-justin-rusty-db/src/networking/api.rs`.

use std::net::SocketAddr;
use std::path::{Component, Path, PathBuf};

use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

use crate::error::MrError;

#[derive(Clone)]
struct ServerState {
    tempdir: PathBuf,
}

/// Starts the `/data/` file server bound to `addr`, returning once the
/// listener is bound (so callers can safely advertise `addr` to peers
/// immediately afterwards). Serving itself runs in a background task.
pub async fn serve(addr: SocketAddr, tempdir: PathBuf) -> Result<(), MrError> {
    let state = ServerState { tempdir };
    let app = Router::new()
        .route("/data/:name", get(get_shard))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MrError::Network(format!("binding HTTP server on {}: {}", addr, e)))?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("HTTP shard server on {} stopped: {}", addr, e);
        }
    });
    Ok(())
}

/// Rejects any name that isn't a single plain path component; the wire
/// contract in spec.md §6 only ever asks for bare shard basenames, so a
/// `..` or `/` in the request can only be an attempt to escape the temp
/// directory.
fn is_plain_basename(name: &str) -> bool {
    let path = Path::new(name);
    path.components().count() == 1 && matches!(path.components().next(), Some(Component::Normal(_)))
}

async fn get_shard(
    State(state): State<ServerState>,
    AxumPath(name): AxumPath<String>,
) -> impl IntoResponse {
    if !is_plain_basename(&name) {
        return (StatusCode::NOT_FOUND, Vec::new());
    }
    match tokio::fs::read(state.tempdir.join(&name)).await {
        Ok(bytes) => (StatusCode::OK, bytes),
        Err(_) => (StatusCode::NOT_FOUND, Vec::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_path_traversal() {
        assert!(!is_plain_basename("../secret"));
        assert!(!is_plain_basename("a/b"));
        assert!(!is_plain_basename(""));
    }

    #[test]
    fn accepts_plain_basenames() {
        assert!(is_plain_basename("map_0_output_1.db"));
        assert!(is_plain_basename("reduce_3_output.db"));
    }
}
