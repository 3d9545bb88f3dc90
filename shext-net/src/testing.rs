//! Helpers for tests of protocols using a [`Connection`].
use anyhow::Context;
use tokio::net::{TcpListener, TcpStream};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan, util::SubscriberInitExt};

use crate::Connection;

const DUPLEX_BUF_SIZE: usize = 1024 * 1024;

/// Create a pair of connected in-memory [`Connection`]s.
#[tracing::instrument]
pub async fn local_conn() -> anyhow::Result<(Connection, Connection)> {
    let (a, b) = tokio::io::duplex(DUPLEX_BUF_SIZE);
    Ok((Connection::new(a), Connection::new(b)))
}

/// Create a pair of [`Connection`]s over a loopback TCP connection.
#[tracing::instrument]
pub async fn tcp_local_conn() -> anyhow::Result<(Connection, Connection)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let (server, client) = tokio::join!(listener.accept(), TcpStream::connect(addr));
    let (server, _) = server.context("server accept")?;
    let client = client.context("client connect")?;
    server.set_nodelay(true)?;
    client.set_nodelay(true)?;
    Ok((Connection::new(server), Connection::new(client)))
}

/// Install a [`tracing_subscriber::fmt`] subscriber for the current test.
///
/// The filter is read from `RUST_LOG`. Keep the returned guard alive for the
/// duration of the test.
pub fn init_tracing() -> tracing::dispatcher::DefaultGuard {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_span_events(FmtSpan::NEW | FmtSpan::ACTIVE | FmtSpan::CLOSE)
        .with_test_writer()
        .set_default()
}
