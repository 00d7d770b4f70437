//! Ctrl+C and SIGTERM handling.
//!
//! The first signal cancels the returned token so the running batch can
//! checkpoint and return. A second signal exits immediately with status 130.

use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let handler_token = token.clone();

    tokio::spawn(async move {
        let mut received = 0u32;
        loop {
            if let Err(e) = next_signal().await {
                error!("unable to listen for shutdown signals: {}", e);
                return;
            }
            received += 1;
            if received == 1 {
                info!("Stopping and saving checkpoint, press Ctrl+C again to force exit");
                handler_token.cancel();
            } else {
                warn!("Force exit requested");
                std::process::exit(130);
            }
        }
    });

    token
}

#[cfg(unix)]
async fn next_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        r = tokio::signal::ctrl_c() => r,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn next_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
