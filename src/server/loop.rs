// Server loop module
// Accepts connections until shutdown, then drains in-flight ones

use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use super::connection::accept_connection;
use super::signal::SignalHandler;
use crate::config;
use crate::logger;

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Accept loop for the demo service.
///
/// Returns once shutdown has been requested and either every connection
/// has finished or `performance.shutdown_grace` has elapsed.
#[allow(clippy::ignored_unit_patterns)]
pub async fn start_server_loop(
    listener: TcpListener,
    state: Arc<config::AppState>,
    signals: Arc<SignalHandler>,
) {
    let shutdown = signals.shutdown.notified();
    tokio::pin!(shutdown);

    if !signals.is_shutdown_requested() {
        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer_addr)) => accept_connection(stream, peer_addr, &state, &signals),
                        Err(e) => logger::log_error(&format!("Failed to accept connection: {e}")),
                    }
                }

                _ = &mut shutdown => break,
            }
        }
    }

    drop(listener);
    let grace = Duration::from_secs(state.config.performance.shutdown_grace);
    let remaining = drain_connections(&state, grace).await;
    logger::log_shutdown_complete(remaining);
}

/// Wait for the active connection count to reach zero, up to `grace`.
/// Returns the count left when waiting stopped.
async fn drain_connections(state: &config::AppState, grace: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + grace;
    loop {
        let remaining = state.connection_count();
        if remaining == 0 || tokio::time::Instant::now() >= deadline {
            return remaining;
        }
        tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
    }
}
