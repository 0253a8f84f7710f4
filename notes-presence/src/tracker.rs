use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use notes_entity::{CursorPosition, Participant, timestamp};
use notes_store::{PresenceSpace, SpaceEvent, SpacePayload};

use crate::color::cursor_color;
use crate::error::PresenceError;

/// A peer's cursor disappears this long after its last position update.
pub const CURSOR_TTL: Duration = Duration::from_millis(1000);

const CHANGE_BUFFER: usize = 100;

/// Profile payload a client enters the space with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PresenceProfile {
  pub participant: Participant,
  pub color: String,
}

/// Ephemeral payload published on every local pointer movement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CursorUpdate {
  pub participant: Participant,
  pub color: String,
  pub position: CursorPosition,
}

/// A currently-tracked remote peer, ready for the cursor overlay.
#[derive(Clone, Debug)]
pub struct PeerCursor {
  pub connection_id: String,
  pub participant: Participant,
  pub color: String,
  /// None until the peer's first cursor update arrives.
  pub position: Option<CursorPosition>,
  pub last_seen: i64,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PresenceChange {
  PeerJoined { connection_id: String },
  PeerMoved { connection_id: String },
  PeerExpired { connection_id: String },
  PeerLeft { connection_id: String },
}

struct PeerState {
  cursor: PeerCursor,
  /// Bumped on every update; a scheduled expiry only fires if the
  /// generation it captured is still current.
  generation: u64,
}

/// Joins a workspace presence space, publishes the local cursor and tracks
/// remote peers, expiring a peer's cursor after [CURSOR_TTL] without an
/// update.
pub struct PresenceTracker {
  connection_id: String,
  participant: Participant,
  color: String,
  space: Arc<dyn PresenceSpace>,
  peers: DashMap<String, PeerState>,
  entered: AtomicBool,
  changes: broadcast::Sender<PresenceChange>,
  shutdown: CancellationToken,
}

impl PresenceTracker {
  /// Enters the space with the local profile and starts tracking peers.
  /// Joining an already-joined space is a no-op; a join failure leaves the
  /// tracker usable for a later retry.
  pub async fn join(
    space: Arc<dyn PresenceSpace>,
    connection_id: impl ToString,
    participant: Participant,
  ) -> Result<Arc<Self>, PresenceError> {
    let color = cursor_color(&participant.user_id);
    let tracker = Arc::new(Self {
      connection_id: connection_id.to_string(),
      participant,
      color,
      space,
      peers: DashMap::new(),
      entered: AtomicBool::new(false),
      changes: broadcast::channel(CHANGE_BUFFER).0,
      shutdown: CancellationToken::new(),
    });
    tracker.enter().await?;
    Self::spawn_event_loop(Arc::downgrade(&tracker), tracker.space.subscribe());
    tracker.seed_roster();
    Ok(tracker)
  }

  async fn enter(&self) -> Result<(), PresenceError> {
    if self.entered.swap(true, Ordering::AcqRel) {
      return Ok(());
    }
    let profile = PresenceProfile {
      participant: self.participant.clone(),
      color: self.color.clone(),
    };
    let payload = serde_json::to_value(&profile)?;
    if let Err(err) = self.space.enter(&self.connection_id, payload).await {
      self.entered.store(false, Ordering::Release);
      tracing::error!("{}: presence join failed: {}", self.connection_id, err);
      return Err(PresenceError::Join(err));
    }
    Ok(())
  }

  /// Members already in the space when we joined.
  fn seed_roster(&self) {
    for (connection_id, profile) in self.space.members() {
      if connection_id == self.connection_id {
        continue;
      }
      match serde_json::from_value::<PresenceProfile>(profile) {
        Ok(profile) => self.upsert_profile(&connection_id, profile),
        Err(err) => tracing::warn!("{}: undecodable member profile: {}", connection_id, err),
      }
    }
  }

  /// Publishes the local pointer position; called at the pointer event rate,
  /// no throttling applied.
  pub fn publish_cursor(&self, position: CursorPosition) -> Result<(), PresenceError> {
    if !self.entered.load(Ordering::Acquire) {
      return Err(PresenceError::NotJoined);
    }
    let update = CursorUpdate {
      participant: self.participant.clone(),
      color: self.color.clone(),
      position,
    };
    let payload = serde_json::to_value(&update)?;
    self.space.publish(&self.connection_id, payload)?;
    Ok(())
  }

  /// Every live remote peer, for the cursor overlay.
  pub fn peers(&self) -> Vec<PeerCursor> {
    self
      .peers
      .iter()
      .map(|entry| entry.value().cursor.clone())
      .collect()
  }

  pub fn changes(&self) -> broadcast::Receiver<PresenceChange> {
    self.changes.subscribe()
  }

  pub fn connection_id(&self) -> &str {
    &self.connection_id
  }

  pub fn color(&self) -> &str {
    &self.color
  }

  /// Leaves the space and cancels every pending expiry.
  pub async fn leave(&self) {
    self.shutdown.cancel();
    self.peers.clear();
    if self.entered.swap(false, Ordering::AcqRel) {
      if let Err(err) = self.space.leave(&self.connection_id).await {
        tracing::warn!("{}: presence leave failed: {}", self.connection_id, err);
      }
    }
  }

  fn spawn_event_loop(tracker: Weak<PresenceTracker>, mut events: broadcast::Receiver<SpaceEvent>) {
    tokio::spawn(async move {
      let shutdown = match tracker.upgrade() {
        Some(t) => t.shutdown.clone(),
        None => return,
      };
      loop {
        tokio::select! {
          _ = shutdown.cancelled() => break,
          event = events.recv() => match event {
            Ok(event) => {
              let Some(t) = tracker.upgrade() else { break };
              t.handle_event(&tracker, event);
            },
            Err(broadcast::error::RecvError::Lagged(missed)) => {
              tracing::warn!("presence events lagged, {} dropped", missed);
            },
            Err(broadcast::error::RecvError::Closed) => break,
          },
        }
      }
    });
  }

  fn handle_event(&self, weak: &Weak<PresenceTracker>, event: SpaceEvent) {
    if event.connection_id == self.connection_id {
      return;
    }
    match event.payload {
      SpacePayload::Entered(profile) => match serde_json::from_value::<PresenceProfile>(profile) {
        Ok(profile) => self.upsert_profile(&event.connection_id, profile),
        Err(err) => {
          tracing::warn!("{}: undecodable profile: {}", event.connection_id, err);
        },
      },
      SpacePayload::Updated(data) => match serde_json::from_value::<CursorUpdate>(data) {
        Ok(update) => {
          let generation = self.upsert_cursor(&event.connection_id, update);
          self.schedule_expiry(weak.clone(), event.connection_id, generation);
        },
        Err(err) => {
          tracing::warn!("{}: undecodable cursor update: {}", event.connection_id, err);
        },
      },
      SpacePayload::Left => {
        if self.peers.remove(&event.connection_id).is_some() {
          let _ = self.changes.send(PresenceChange::PeerLeft {
            connection_id: event.connection_id,
          });
        }
      },
    }
  }

  fn upsert_profile(&self, connection_id: &str, profile: PresenceProfile) {
    let is_new = !self.peers.contains_key(connection_id);
    self
      .peers
      .entry(connection_id.to_string())
      .and_modify(|peer| {
        peer.cursor.participant = profile.participant.clone();
        peer.cursor.color = profile.color.clone();
        peer.cursor.last_seen = timestamp();
      })
      .or_insert_with(|| PeerState {
        cursor: PeerCursor {
          connection_id: connection_id.to_string(),
          participant: profile.participant,
          color: profile.color,
          position: None,
          last_seen: timestamp(),
        },
        generation: 0,
      });
    if is_new {
      let _ = self.changes.send(PresenceChange::PeerJoined {
        connection_id: connection_id.to_string(),
      });
    }
  }

  fn upsert_cursor(&self, connection_id: &str, update: CursorUpdate) -> u64 {
    let mut entry = self
      .peers
      .entry(connection_id.to_string())
      .or_insert_with(|| PeerState {
        cursor: PeerCursor {
          connection_id: connection_id.to_string(),
          participant: update.participant.clone(),
          color: update.color.clone(),
          position: None,
          last_seen: timestamp(),
        },
        generation: 0,
      });
    entry.cursor.position = Some(update.position);
    entry.cursor.last_seen = timestamp();
    entry.generation += 1;
    let generation = entry.generation;
    drop(entry);
    let _ = self.changes.send(PresenceChange::PeerMoved {
      connection_id: connection_id.to_string(),
    });
    generation
  }

  /// Removes the peer after [CURSOR_TTL] unless a newer update superseded
  /// the captured generation first.
  fn schedule_expiry(&self, tracker: Weak<PresenceTracker>, connection_id: String, generation: u64) {
    let shutdown = self.shutdown.clone();
    tokio::spawn(async move {
      tokio::select! {
        _ = shutdown.cancelled() => {},
        _ = tokio::time::sleep(CURSOR_TTL) => {
          if let Some(t) = tracker.upgrade() {
            t.expire(&connection_id, generation);
          }
        },
      }
    });
  }

  fn expire(&self, connection_id: &str, generation: u64) {
    let expired = self
      .peers
      .remove_if(connection_id, |_, peer| peer.generation == generation)
      .is_some();
    if expired {
      let _ = self.changes.send(PresenceChange::PeerExpired {
        connection_id: connection_id.to_string(),
      });
    }
  }
}

impl Drop for PresenceTracker {
  fn drop(&mut self) {
    self.shutdown.cancel();
  }
}
