//! Command-line surface (spec.md §6) and the runtime configuration derived
//! from it. Defaults mirror `original_source/mapreduce/master.go`'s
//! `getFlags`; the builder shape is carried over from the teacher's
//! `MRParameters`.

use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;

use clap::Parser;

use crate::error::MrError;

/// A coordinator and worker share this one binary; `--master` selects the
/// role.
#[derive(Parser, Debug, Clone)]
#[command(name = "shufflemr", about = "A networked coordinator/worker MapReduce engine")]
pub struct Cli {
    /// Worker: coordinator address. Coordinator: "localhost" (unused).
    #[arg(long, default_value = "localhost")]
    pub address: String,

    /// Port this node listens on, for both the HTTP shard server and RPC.
    #[arg(long, default_value_t = 3410)]
    pub port: u16,

    /// Input file (coordinator only).
    #[arg(long, default_value = "source.sqlite3")]
    pub source: String,

    /// Final output file (coordinator only).
    #[arg(long, default_value = "target.sqlite3")]
    pub target: String,

    /// Temporary directory. Defaults to a PID-suffixed path under the
    /// system temp directory.
    #[arg(long)]
    pub tmp: Option<PathBuf>,

    /// Number of map tasks.
    #[arg(long = "m", default_value_t = 10)]
    pub m: usize,

    /// Number of reduce tasks.
    #[arg(long = "r", default_value_t = 5)]
    pub r: usize,

    /// Run as the coordinator.
    #[arg(long, default_value_t = false)]
    pub master: bool,

    /// Present in the original CLI surface but never read; kept for
    /// compatibility, matching spec.md §9.
    #[arg(long, default_value_t = false)]
    pub split: bool,
}

impl Cli {
    /// Resolves `--tmp`, falling back to the PID-suffixed default.
    pub fn tempdir(&self) -> PathBuf {
        self.tmp.clone().unwrap_or_else(default_tempdir)
    }
}

fn default_tempdir() -> PathBuf {
    std::env::temp_dir().join(format!("shufflemr.{}", std::process::id()))
}

/// Finds the outbound-routable IPv4 address of this host by opening a UDP
/// "connection" to a well-known external address and reading the socket's
/// local endpoint; no packets are actually sent. Ported from
/// `original_source/mapreduce/master.go`'s `getLocalAddress`, so that a
/// node advertises an address other hosts can dial rather than loopback.
pub fn local_address() -> Result<String, MrError> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .map_err(|e| MrError::Network(format!("opening probe socket: {}", e)))?;
    socket
        .connect("8.8.8.8:80")
        .map_err(|e| MrError::Network(format!("probing outbound route: {}", e)))?;
    let addr = socket
        .local_addr()
        .map_err(|e| MrError::Network(format!("reading local address: {}", e)))?;
    Ok(addr.ip().to_string())
}

/// Builds `host:port` for this node, using `local_address()`.
pub fn own_address(port: u16) -> Result<String, MrError> {
    Ok(format!("{}:{}", local_address()?, port))
}

/// Binds an address of the form `ip:port` for the HTTP/RPC listeners,
/// always on all interfaces (`0.0.0.0:port`) regardless of the advertised
/// IP: mirrors the Go implementation binding to `:port`.
pub fn bind_address(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Every node serves its RPC (tarpc) endpoint on the advertised port and
/// its `/data/` HTTP endpoint on the next port up.
///
/// The reference implementation binds both services to the literal same
/// `host:port` (one `net.Listen` for the RPC server, one
/// `http.ListenAndServe` for the file server): two listeners on one port
/// from one process, which a real OS refuses. Rather than reproduce that
/// latent bind conflict, every address this crate advertises (worker
/// registry entries, `MapTask`/`ReduceTask` source hosts) names the RPC
/// port, and callers needing the data-plane URL derive it with
/// `data_address`. See DESIGN.md.
pub fn data_address(rpc_address: &str) -> Result<String, MrError> {
    let (host, port) = rpc_address
        .rsplit_once(':')
        .ok_or_else(|| MrError::Protocol(format!("address missing port: {}", rpc_address)))?;
    let port: u16 = port
        .parse()
        .map_err(|_| MrError::Protocol(format!("address has non-numeric port: {}", rpc_address)))?;
    Ok(format!("{}:{}", host, port + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_address_bumps_port() {
        assert_eq!(data_address("10.0.0.5:3410").unwrap(), "10.0.0.5:3411");
    }

    #[test]
    fn data_address_rejects_missing_port() {
        assert!(data_address("10.0.0.5").is_err());
    }
}
