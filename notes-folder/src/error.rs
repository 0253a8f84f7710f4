use notes_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum FolderError {
  #[error(transparent)]
  Store(#[from] StoreError),

  #[error(transparent)]
  Internal(#[from] anyhow::Error),
}
