use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Distinguishes uploaded files from authored notes. Together with a folder
/// id this forms the partition key the reconciler replaces snapshots by.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
  File,
  Note,
}

impl Display for ItemKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ItemKind::File => f.write_str("file"),
      ItemKind::Note => f.write_str("note"),
    }
  }
}

/// One file or note as rendered by the grid and sidebar. Local copies are
/// caches: every collection snapshot fully replaces the entries of its
/// `(folder_id, kind)` partition.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WorkspaceItem {
  pub id: String,
  pub folder_id: String,
  pub kind: ItemKind,
  pub name: String,
  /// Download url, files only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub blob_url: Option<String>,
  /// Extension derived from the uploaded blob name, files only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub extension: Option<String>,
  /// Rich-text body, notes only.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub content: Option<String>,
  pub updated_at: i64,
}

impl WorkspaceItem {
  /// The uniqueness key of the aggregate item list: no two entries may share
  /// the same `(kind, folder_id, id)`.
  pub fn identity(&self) -> (ItemKind, &str, &str) {
    (self.kind, &self.folder_id, &self.id)
  }

  pub fn partition(&self) -> (&str, ItemKind) {
    (&self.folder_id, self.kind)
  }

  /// Characters this item contributes to the workspace character budget.
  pub fn char_count(&self) -> usize {
    self
      .content
      .as_ref()
      .map(|c| c.chars().count())
      .unwrap_or(0)
  }
}

/// Folder metadata, fetched on demand and cached by id for display.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct FolderInfo {
  pub id: String,
  pub name: String,
  pub created_at: i64,
}

/// A full current snapshot of one `(folder, kind)` collection, delivered by
/// the store on every change to that collection.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CollectionSnapshot {
  pub workspace_id: String,
  pub folder_id: String,
  pub kind: ItemKind,
  pub items: Vec<WorkspaceItem>,
}

impl CollectionSnapshot {
  pub fn partition(&self) -> (&str, ItemKind) {
    (&self.folder_id, self.kind)
  }
}
