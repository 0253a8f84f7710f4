#[derive(Debug, thiserror::Error)]
pub enum StoreError {
  #[error("record not found: {0}")]
  RecordNotFound(String),

  #[error("record already exists: {0}")]
  RecordAlreadyExists(String),

  #[error("blob not found: {0}")]
  BlobNotFound(String),

  #[error("realtime channel closed")]
  ChannelClosed,

  #[error("backend failure: {0}")]
  Backend(String),

  #[error(transparent)]
  SerdeJson(#[from] serde_json::Error),

  #[error(transparent)]
  Internal(#[from] anyhow::Error),
}
