use std::panic::{AssertUnwindSafe, catch_unwind};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

type Job = Box<dyn FnOnce() + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("dispatcher closed")]
pub struct DispatchClosed;

/// Runs callbacks on a dedicated task, one at a time, in submission order.
///
/// Callers never run callbacks on their own stack: a callback may observe
/// application state concurrently with the code that triggered it. The task
/// ends once every `Dispatcher` handle is dropped.
#[derive(Clone)]
pub struct Dispatcher {
    tx: mpsc::UnboundedSender<Job>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl Dispatcher {
    /// Spawn the dispatch task on the current tokio runtime.
    ///
    /// Must be called from within a runtime.
    pub fn spawn() -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                if catch_unwind(AssertUnwindSafe(job)).is_err() {
                    tracing::error!("callback panicked");
                }
            }
            tracing::debug!("dispatcher stopped");
        });
        (Self { tx }, handle)
    }

    /// The dispatch task is gone; every `dispatch` would fail.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    pub fn dispatch(&self, job: impl FnOnce() + Send + 'static) -> Result<(), DispatchClosed> {
        self.tx.send(Box::new(job)).map_err(|_| DispatchClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_jobs_in_order() {
        let (dispatcher, handle) = Dispatcher::spawn();
        let (tx, mut rx) = mpsc::unbounded_channel();

        for i in 0..5 {
            let tx = tx.clone();
            dispatcher.dispatch(move || tx.send(i).unwrap()).unwrap();
        }
        drop(dispatcher);
        handle.await.unwrap();

        let mut seen = Vec::new();
        while let Ok(i) = rx.try_recv() {
            seen.push(i);
        }
        assert_eq!(seen, [0, 1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn survives_panicking_job() {
        let (dispatcher, handle) = Dispatcher::spawn();
        let (tx, mut rx) = mpsc::unbounded_channel();

        dispatcher.dispatch(|| panic!("boom")).unwrap();
        dispatcher.dispatch(move || tx.send("after").unwrap()).unwrap();
        drop(dispatcher);
        handle.await.unwrap();

        assert_eq!(rx.try_recv().unwrap(), "after");
    }

    #[tokio::test]
    async fn dispatch_fails_once_task_is_gone() {
        let (dispatcher, handle) = Dispatcher::spawn();
        assert!(!dispatcher.is_closed());

        handle.abort();
        let _ = handle.await;

        assert!(dispatcher.is_closed());
        assert_eq!(dispatcher.dispatch(|| {}), Err(DispatchClosed));
    }
}
