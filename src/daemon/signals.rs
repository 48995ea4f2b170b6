//! Termination signal handling.
//!
//! CHANGELOG:
//! - 10/19/2026 - Initial implementation (Claude)

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Install handlers for SIGTERM and SIGINT.
///
/// Returns a token that is cancelled when either signal arrives.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("Received SIGINT, shutting down gracefully"),
                        _ = sigterm.recv() => info!("Received SIGTERM, shutting down gracefully"),
                    }
                }
                Err(e) => {
                    error!(error = %e, "Failed to install SIGTERM handler, listening for SIGINT only");
                    let _ = ctrl_c.await;
                    info!("Received SIGINT, shutting down gracefully");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("Received Ctrl+C, shutting down gracefully");
        }

        token_clone.cancel();
        debug!("Signal handler completed");
    });

    token
}
