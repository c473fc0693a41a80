//! Process lifecycle: listens for termination signals and lets the server shut down gracefully.

use std::sync::LazyLock;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::watch;

static RUNNING: LazyLock<watch::Sender<bool>> = LazyLock::new(|| watch::Sender::new(true));

pub fn install_termination_listener() {
    tokio::spawn(async move {
        let mut sig_term = signal(SignalKind::terminate()).ok();
        let mut sig_int = signal(SignalKind::interrupt()).ok();
        let mut sig_hup = signal(SignalKind::hangup()).ok();

        tokio::select! {
            Some(_) = async { sig_int.as_mut()?.recv().await } => {
                tracing::info!("Received SIGINT. Shutting down...");
            },
            Some(_) = async { sig_term.as_mut()?.recv().await } => {
                tracing::info!("Received SIGTERM. Shutting down...");
            },
            Some(_) = async { sig_hup.as_mut()?.recv().await } => {
                tracing::info!("Received SIGHUP. Shutting down...");
            },
        }

        request_shutdown();
    });
}

/// Marks the process as stopping and wakes up everyone waiting in [`await_shutdown`].
pub fn request_shutdown() {
    RUNNING.send_replace(false);
}

pub async fn await_shutdown() {
    let mut running = RUNNING.subscribe();
    // The sender lives in a static and is never dropped, so this only returns once stopped.
    let _ = running.wait_for(|running| !*running).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn shutdown_wakes_up_waiters() {
        let waiter = tokio::spawn(await_shutdown());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        request_shutdown();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(!*RUNNING.borrow());
    }
}
