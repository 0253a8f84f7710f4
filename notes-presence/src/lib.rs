pub use color::cursor_color;
pub use tracker::{
  CURSOR_TTL, CursorUpdate, PeerCursor, PresenceChange, PresenceProfile, PresenceTracker,
};

pub mod error;

mod color;
mod tracker;
