//! Featrow serving layer
//!
//! Serves already-ingested feature rows over TCP. All request handling runs
//! through one shared, capacity-bounded executor supplied at construction;
//! the server never spawns unbounded concurrency per request.

pub mod executor;
pub mod protocol;
pub mod server;

pub use executor::{BoundedExecutor, ExecutorError};
pub use protocol::{Request, Response, WireError, WireResult, MAX_FRAME_SIZE};
pub use server::{FeatureServer, InMemoryRowStore, RowStore, ServeConfig};

/// Initialize tracing from `RUST_LOG`, falling back to the given filter
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
