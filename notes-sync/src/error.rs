use notes_entity::delta::DeltaError;
use notes_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
  #[error("editor session is not ready yet")]
  NotReady,

  #[error("workspace character limit of {limit} exceeded")]
  CharLimitExceeded { limit: usize },

  #[error(transparent)]
  Delta(#[from] DeltaError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  SerdeJson(#[from] serde_json::Error),

  #[error(transparent)]
  Internal(#[from] anyhow::Error),
}
