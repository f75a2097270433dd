use thiserror::Error;

/// Why a story fetch produced no stories.
///
/// Each variant ends the fetch that produced it; nothing is retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
  /// The remote source could not be reached or answered with something unreadable.
  #[error("transport error: {0}")]
  Transport(String),

  /// The remote source answered, but there was nothing usable in the answer.
  #[error("no data: {0}")]
  NoData(String),

  /// The background task ended without producing a result.
  #[error("fetch aborted: {0}")]
  Aborted(String),
}

impl FetchError {
  pub fn is_transport(&self) -> bool {
    matches!(self, FetchError::Transport(_))
  }

  pub fn is_no_data(&self) -> bool {
    matches!(self, FetchError::NoData(_))
  }
}
