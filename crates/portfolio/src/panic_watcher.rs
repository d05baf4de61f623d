use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tracing::{error, info};

use common::{EngineEvent, Result};

const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Polls a filesystem rendezvous file (spec §4.8); on presence, enqueues an
/// `EngineEvent::Panic` and best-effort removes the file so a future restart
/// doesn't immediately re-trigger liquidation.
///
/// Takes a plain enqueue callback rather than a `BusHandle` directly so this
/// crate has no dependency on `engine` (which itself depends on `portfolio`).
pub struct PanicWatcher<F> {
    path: PathBuf,
    enqueue: F,
}

type EnqueueFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

impl<F> PanicWatcher<F>
where
    F: Fn(EngineEvent) -> EnqueueFuture + Send + 'static,
{
    pub fn new(path: impl Into<PathBuf>, enqueue: F) -> Self {
        Self {
            path: path.into(),
            enqueue,
        }
    }

    pub async fn run(self) {
        info!(path = %self.path.display(), "panic watcher started");
        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            self.check_once().await;
        }
    }

    /// One poll: if the rendezvous file exists, enqueue the panic event and
    /// best-effort delete it. Split out of `run` so a single tick can be
    /// exercised directly without waiting on the real poll interval.
    async fn check_once(&self) {
        if !self.path.exists() {
            return;
        }
        info!(path = %self.path.display(), "panic rendezvous file detected");
        if let Err(e) = (self.enqueue)(EngineEvent::Panic).await {
            error!(error = %e, "failed to enqueue panic event");
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            error!(path = %self.path.display(), error = %e, "failed to remove panic file");
        }
    }
}
