use std::sync::atomic::{AtomicUsize, Ordering};

use notes_entity::WorkspaceItem;

use crate::error::SyncError;

/// Characters a workspace may hold across all of its notes.
pub const DEFAULT_CHAR_LIMIT: usize = 200_000;

/// Workspace-wide character ceiling, checked synchronously before a local
/// edit is applied. The running total is recomputed from actual content
/// lengths rather than maintained as a tally across unrelated code paths, so
/// it cannot drift from the stored content.
pub struct CharBudget {
  limit: usize,
  used: AtomicUsize,
}

impl CharBudget {
  pub fn new(limit: usize) -> Self {
    Self {
      limit,
      used: AtomicUsize::new(0),
    }
  }

  /// Budget seeded from the workspace's current items.
  pub fn from_items<'a>(limit: usize, items: impl IntoIterator<Item = &'a WorkspaceItem>) -> Self {
    let budget = Self::new(limit);
    budget.recompute(items);
    budget
  }

  pub fn limit(&self) -> usize {
    self.limit
  }

  pub fn used(&self) -> usize {
    self.used.load(Ordering::Acquire)
  }

  /// Replaces the running total with the sum of actual content lengths.
  pub fn recompute<'a>(&self, items: impl IntoIterator<Item = &'a WorkspaceItem>) {
    let total = items.into_iter().map(|item| item.char_count()).sum();
    self.used.store(total, Ordering::Release);
  }

  /// Admits an edit that changes one document from `old_len` to `new_len`
  /// characters. Rejects without side effects when the projected workspace
  /// total would exceed the ceiling.
  pub fn admit(&self, old_len: usize, new_len: usize) -> Result<(), SyncError> {
    loop {
      let used = self.used.load(Ordering::Acquire);
      let projected = used.saturating_sub(old_len) + new_len;
      if projected > self.limit {
        return Err(SyncError::CharLimitExceeded { limit: self.limit });
      }
      if self
        .used
        .compare_exchange(used, projected, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
      {
        return Ok(());
      }
    }
  }

  /// Tracks a remote edit's net character change without admission control;
  /// the publishing peer already passed its own pre-check.
  pub fn shift(&self, char_delta: i64) {
    if char_delta >= 0 {
      self.used.fetch_add(char_delta as usize, Ordering::AcqRel);
    } else {
      let drop = char_delta.unsigned_abs() as usize;
      loop {
        let used = self.used.load(Ordering::Acquire);
        let next = used.saturating_sub(drop);
        if self
          .used
          .compare_exchange(used, next, Ordering::AcqRel, Ordering::Acquire)
          .is_ok()
        {
          break;
        }
      }
    }
  }
}
