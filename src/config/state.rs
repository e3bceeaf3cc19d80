// Application state module
// Shared, read-mostly state handed to every connection

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use super::types::Config;

/// Application state
pub struct AppState {
    pub config: Config,
    /// Process start, used for the uptime reported by `GET /`
    pub started_at: Instant,
    pub active_connections: AtomicUsize,
}

impl AppState {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.clone(),
            started_at: Instant::now(),
            active_connections: AtomicUsize::new(0),
        }
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::SeqCst)
    }
}
