//! crates/study_tracker_core/src/side_channel.rs
//!
//! An ordered, best-effort background lane for writes the caller must not wait on
//! (mirror store, external snapshot). Jobs run one at a time in submission order,
//! so an older document never lands on top of a newer one. Jobs own their error
//! handling; nothing is reported back to the submitter.

use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

enum Command {
    Run(BoxFuture<'static, ()>),
    Flush(oneshot::Sender<()>),
}

#[derive(Clone)]
pub struct SideChannel {
    tx: mpsc::UnboundedSender<Command>,
}

impl SideChannel {
    /// Starts the worker task. Must be called from within a Tokio runtime.
    pub fn spawn() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Run(job) => job.await,
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
            debug!("Side channel closed.");
        });
        Self { tx }
    }

    /// Queues `job` behind everything submitted before it and returns immediately.
    pub fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if self.tx.send(Command::Run(Box::pin(job))).is_err() {
            warn!("Side channel worker is gone; dropping background write.");
        }
    }

    /// Waits until every job submitted so far has finished.
    pub async fn settle(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}
