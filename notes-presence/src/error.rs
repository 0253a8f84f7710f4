use notes_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
  #[error("not joined to the presence space")]
  NotJoined,

  #[error("failed to join the presence space: {0}")]
  Join(StoreError),

  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  SerdeJson(#[from] serde_json::Error),

  #[error(transparent)]
  Internal(#[from] anyhow::Error),
}
