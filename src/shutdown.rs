use tokio_util::sync::CancellationToken;

/// Process-wide stop flags. The first signal asks workers to finish their
/// current step; a second one aborts whatever is still running.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    stop: CancellationToken,
    force: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns the SIGINT/SIGTERM listener.
    pub fn listen() -> Self {
        let shutdown = Self::new();
        let listener = shutdown.clone();

        tokio::spawn(async move {
            let Some(name) = next_signal().await else {
                return;
            };
            tracing::warn!("Received {name}, stopping after the current step...");
            listener.stop.cancel();

            if let Some(name) = next_signal().await {
                tracing::warn!("Received {name} again, aborting remaining workers");
                listener.force.cancel();
            }
        });

        shutdown
    }

    pub fn stop_token(&self) -> CancellationToken {
        self.stop.clone()
    }

    pub fn force_token(&self) -> CancellationToken {
        self.force.clone()
    }

    /// Idempotent.
    #[cfg(test)]
    pub fn trigger(&self) {
        self.stop.cancel();
    }
}

async fn next_signal() -> Option<&'static str> {
    wait_for_signal()
        .await
        .inspect_err(|e| tracing::error!("Unable to listen for shutdown signal: {e}"))
        .ok()
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "Ctrl+C")
}
