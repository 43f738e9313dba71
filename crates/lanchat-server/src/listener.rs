use std::io::ErrorKind;
use std::net::SocketAddr;

use anyhow::{Context, Result, bail};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Ports tried past the configured one before giving up.
pub const PORT_ATTEMPTS: u16 = 100;

/// Bind `addr`, moving up one port at a time while the port is in use.
///
/// Any other bind error is returned as-is.
pub async fn bind_available(addr: SocketAddr, attempts: u16) -> Result<TcpListener> {
    let mut candidate = addr;

    for _ in 0..=attempts {
        match TcpListener::bind(candidate).await {
            Ok(listener) => {
                if candidate.port() != addr.port() {
                    info!("Port {} was in use, using port {} instead", addr.port(), candidate.port());
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => {
                let Some(next) = candidate.port().checked_add(1) else { break };
                warn!("Port {} is in use, trying {}...", candidate.port(), next);
                candidate.set_port(next);
            }
            Err(e) => return Err(e).with_context(|| format!("cannot bind {candidate}")),
        }
    }

    bail!("no free port in {}..={}", addr.port(), candidate.port())
}
