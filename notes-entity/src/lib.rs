pub use document::*;
pub use item::*;
pub use participant::*;

mod document;
mod item;
mod participant;

pub mod delta;

/// Seconds since the unix epoch, the timestamp unit used across the
/// workspace (document `updated_at`, folder `created_at`, peer last-seen).
pub fn timestamp() -> i64 {
  chrono::Utc::now().timestamp()
}
