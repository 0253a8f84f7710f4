use std::sync::Arc;

use notes_entity::{CursorPosition, Participant};
use notes_presence::{CursorUpdate, PresenceProfile, PresenceTracker, cursor_color};
use notes_store::{MemoryTransport, PresenceSpace, RealtimeTransport};

pub fn participant(user_id: &str) -> Participant {
  Participant::new(user_id, format!("User {}", user_id), format!("{}@example.com", user_id))
}

pub struct PresenceTestSpace {
  pub space: Arc<dyn PresenceSpace>,
}

impl PresenceTestSpace {
  pub fn new() -> Self {
    let transport = MemoryTransport::new();
    Self {
      space: transport.space("ws-1"),
    }
  }

  pub async fn join(&self, connection_id: &str, user_id: &str) -> Arc<PresenceTracker> {
    PresenceTracker::join(self.space.clone(), connection_id, participant(user_id))
      .await
      .unwrap()
  }

  /// Simulates a remote client entering the space directly over the
  /// transport, bypassing a local tracker.
  pub async fn raw_enter(&self, connection_id: &str, user_id: &str) {
    let profile = PresenceProfile {
      participant: participant(user_id),
      color: cursor_color(user_id),
    };
    self
      .space
      .enter(connection_id, serde_json::to_value(&profile).unwrap())
      .await
      .unwrap();
  }

  pub fn raw_publish(&self, connection_id: &str, user_id: &str, x: f64, y: f64) {
    let update = CursorUpdate {
      participant: participant(user_id),
      color: cursor_color(user_id),
      position: CursorPosition::new(x, y),
    };
    self
      .space
      .publish(connection_id, serde_json::to_value(&update).unwrap())
      .unwrap();
  }
}
