use tokio_util::sync::CancellationToken;

/// Returns a token cancelled on Ctrl-C or, on unix, SIGTERM.
///
/// The worker finishes the job in hand before it observes the token.
pub fn install_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.cancel();
    });

    token
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "Could not install SIGTERM handler; Ctrl-C only");
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C, stopping after current job");
            }
            return;
        }
    };

    tokio::select! {
        _ = sigterm.recv() => tracing::info!("Received SIGTERM, stopping after current job"),
        _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl-C, stopping after current job"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Received Ctrl-C, stopping after current job");
    }
}
