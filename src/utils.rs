//utils for graceful shutdown and logging setup shared by the servers
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// A token that is cancelled on ctrl-c.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let tc = token.clone();
    //spawn once to listen for ctrl-c
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                info!("received ctrl-c, shutting down");
                tc.cancel();
            }
            Err(e) => warn!(error = %e, "failed to install ctrl-c handler"),
        }
    });
    token
}

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    // a second init (e.g. from tests) keeps the first subscriber
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
