//! Background execution for blocking fetches.
//!
//! A [`FetchHandle`] runs one blocking closure on tokio's blocking pool and
//! hands its result back to whoever owns the handle, exactly once. The owner
//! collects it from its own task, either by polling from an event loop tick or
//! by awaiting it.
//!
//! # Example
//!
//! ```ignore
//! let mut handle = repository.fetch_stories_async();
//!
//! // In event loop tick
//! if let Some(result) = handle.poll() {
//!     match result {
//!         Ok(stories) => render_stories(stories),
//!         Err(e) => render_error(e),
//!     }
//! }
//!
//! // When the screen goes away
//! handle.cancel();
//! ```
//!
//! Cancelling never interrupts the closure once it has started; it only
//! guarantees that its result is never delivered.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::news::FetchError;

/// Where a fetch is in its life, as seen by the handle's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
  /// Scheduled, the closure has not started yet
  Pending,
  /// In flight from the owner's point of view: the closure is running, or it
  /// has returned and its result is waiting to be collected. A result that
  /// was never collected can still be cancelled.
  Running,
  /// Result collected: success
  Succeeded,
  /// Result collected: failure
  Failed,
  /// Cancelled before a result was collected
  Cancelled,
}

impl FetchStatus {
  pub fn is_completed(&self) -> bool {
    matches!(
      self,
      FetchStatus::Succeeded | FetchStatus::Failed | FetchStatus::Cancelled
    )
  }
}

/// Handle to a single background fetch.
///
/// Dropping the handle cancels the fetch.
pub struct FetchHandle<T> {
  receiver: Option<oneshot::Receiver<Result<T, FetchError>>>,
  started: Arc<AtomicBool>,
  cancelled: Arc<AtomicBool>,
  completed: Option<FetchStatus>,
  task: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> FetchHandle<T> {
  /// Schedule `work` on the blocking pool.
  ///
  /// Must be called from within a tokio runtime.
  pub fn spawn_blocking<F>(work: F) -> Self
  where
    F: FnOnce() -> Result<T, FetchError> + Send + 'static,
  {
    let (tx, rx) = oneshot::channel();
    let started = Arc::new(AtomicBool::new(false));
    let cancelled = Arc::new(AtomicBool::new(false));

    let task = {
      let started = Arc::clone(&started);
      let cancelled = Arc::clone(&cancelled);
      tokio::task::spawn_blocking(move || {
        if cancelled.load(Ordering::SeqCst) {
          debug!("fetch cancelled before it started");
          return;
        }
        started.store(true, Ordering::SeqCst);

        let result = work();

        if cancelled.load(Ordering::SeqCst) {
          debug!("fetch cancelled, discarding result");
          return;
        }
        // Ignore send errors - receiver may have been dropped
        let _ = tx.send(result);
      })
    };

    Self {
      receiver: Some(rx),
      started,
      cancelled,
      completed: None,
      task: Some(task),
    }
  }

  /// Current status of the fetch.
  ///
  /// Only collecting the result (or cancelling) makes it completed; a closure
  /// that has returned but was not polled yet still reports `Running`.
  pub fn status(&self) -> FetchStatus {
    match self.completed {
      Some(status) => status,
      None if self.started.load(Ordering::SeqCst) => FetchStatus::Running,
      None => FetchStatus::Pending,
    }
  }

  /// Collect the result without blocking.
  ///
  /// Returns `Some` exactly once, when the result is available. Returns `None`
  /// while the fetch is in flight, after cancellation, and after the result
  /// has been collected.
  pub fn poll(&mut self) -> Option<Result<T, FetchError>> {
    let receiver = self.receiver.as_mut()?;

    match receiver.try_recv() {
      Ok(result) => Some(self.complete(result)),
      Err(oneshot::error::TryRecvError::Empty) => None,
      Err(oneshot::error::TryRecvError::Closed) => Some(self.complete(Err(aborted()))),
    }
  }

  /// Wait for the result.
  ///
  /// Same delivery rules as [`poll`](Self::poll): `None` if cancelled or
  /// already collected.
  pub async fn wait(&mut self) -> Option<Result<T, FetchError>> {
    let receiver = self.receiver.as_mut()?;
    let result = receiver.await.unwrap_or_else(|_| Err(aborted()));
    Some(self.complete(result))
  }

  /// Stop the result from being delivered.
  ///
  /// Idempotent, and a no-op once the result has been collected. A closure
  /// that has not started yet is skipped; one that is running is left to
  /// finish and its result is dropped.
  pub fn cancel(&mut self) {
    if self.completed.is_some() {
      return;
    }
    self.cancelled.store(true, Ordering::SeqCst);
    self.receiver = None;
    self.completed = Some(FetchStatus::Cancelled);
    debug!("fetch cancelled");
  }

  /// Wait until the background closure has returned (or was skipped).
  ///
  /// This does not collect the result.
  pub async fn finished(&mut self) {
    if let Some(task) = self.task.take() {
      if let Err(e) = task.await {
        warn!(error = %e, "background fetch task failed");
      }
    }
  }

  fn complete(&mut self, result: Result<T, FetchError>) -> Result<T, FetchError> {
    self.receiver = None;
    self.completed = Some(if result.is_ok() {
      FetchStatus::Succeeded
    } else {
      FetchStatus::Failed
    });
    result
  }
}

fn aborted() -> FetchError {
  FetchError::Aborted("background task ended without a result".to_string())
}

impl<T> Drop for FetchHandle<T> {
  fn drop(&mut self) {
    if self.completed.is_none() {
      self.cancelled.store(true, Ordering::SeqCst);
    }
  }
}

impl<T> std::fmt::Debug for FetchHandle<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FetchHandle")
      .field("started", &self.started.load(Ordering::SeqCst))
      .field("cancelled", &self.cancelled.load(Ordering::SeqCst))
      .field("completed", &self.completed)
      .finish_non_exhaustive()
  }
}
