use async_trait::async_trait;
use tokio::sync::broadcast;

use notes_entity::{CollectionSnapshot, Document, DocumentKey, FolderInfo, ItemKind, WorkspaceItem};

use crate::error::StoreError;

/// A live subscription to one `(folder, kind)` collection. The store delivers
/// the current snapshot up front and a fresh full snapshot on every change to
/// that collection.
pub struct CollectionSubscription {
  pub snapshot: CollectionSnapshot,
  pub updates: broadcast::Receiver<CollectionSnapshot>,
}

/// A live subscription to the folder list of a workspace.
pub struct FolderSubscription {
  pub folders: Vec<FolderInfo>,
  pub updates: broadcast::Receiver<Vec<FolderInfo>>,
}

/// The document-store seam. Everything the synchronization layer knows about
/// persistence goes through this trait, so the whole layer runs unchanged
/// against the in-memory reference backend or a managed remote one.
#[async_trait]
pub trait DocumentStore: Send + Sync + 'static {
  /// One-shot fetch of a document snapshot.
  async fn get_document(&self, key: &DocumentKey) -> Result<Option<Document>, StoreError>;

  /// Merge-write of a document's content, bumping its `updated_at`. Creates
  /// the document when absent; other fields of an existing record survive.
  async fn set_document(&self, key: &DocumentKey, content: &str) -> Result<(), StoreError>;

  async fn list_folders(&self, workspace_id: &str) -> Result<Vec<FolderInfo>, StoreError>;

  async fn get_folder(
    &self,
    workspace_id: &str,
    folder_id: &str,
  ) -> Result<Option<FolderInfo>, StoreError>;

  async fn create_folder(&self, workspace_id: &str, folder: FolderInfo)
  -> Result<(), StoreError>;

  async fn rename_folder(
    &self,
    workspace_id: &str,
    folder_id: &str,
    name: &str,
  ) -> Result<(), StoreError>;

  /// Deletes a folder, cascading to every item inside it and to the blobs
  /// backing its files.
  async fn delete_folder(&self, workspace_id: &str, folder_id: &str) -> Result<(), StoreError>;

  async fn upsert_item(&self, workspace_id: &str, item: WorkspaceItem) -> Result<(), StoreError>;

  async fn delete_item(
    &self,
    workspace_id: &str,
    folder_id: &str,
    kind: ItemKind,
    id: &str,
  ) -> Result<(), StoreError>;

  async fn subscribe_collection(
    &self,
    workspace_id: &str,
    folder_id: &str,
    kind: ItemKind,
  ) -> Result<CollectionSubscription, StoreError>;

  async fn subscribe_folders(&self, workspace_id: &str) -> Result<FolderSubscription, StoreError>;
}

/// Binary object storage keyed by `workspace/folder/filename`.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
  /// Uploads the blob and returns its download url.
  async fn upload_blob(
    &self,
    workspace_id: &str,
    folder_id: &str,
    filename: &str,
    bytes: Vec<u8>,
  ) -> Result<String, StoreError>;

  async fn resolve_blob_url(
    &self,
    workspace_id: &str,
    folder_id: &str,
    filename: &str,
  ) -> Result<String, StoreError>;

  async fn delete_blob(&self, url: &str) -> Result<(), StoreError>;
}
