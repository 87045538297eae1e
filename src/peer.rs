//! Peer table: heard peers with last-seen expiry.

use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct PeerInfo {
    pub user_id: String,
    pub username: String,
}

#[derive(Debug, Clone)]
struct PeerEntry {
    username: String,
    last_seen: Instant,
}

/// Tracks heard peers keyed by `userId`, applying observations in the
/// arrival order of the frames that carried them — `observe` is only
/// ever called synchronously from the decode path, so ordering falls
/// out for free.
pub struct PeerTable {
    self_id: String,
    expiry: Duration,
    peers: HashMap<String, PeerEntry>,
}

impl PeerTable {
    pub fn new(self_id: impl Into<String>, expiry: Duration) -> Self {
        Self {
            self_id: self_id.into(),
            expiry,
            peers: HashMap::new(),
        }
    }

    /// Refreshes `lastSeen` for `user_id`, inserting it if new. A no-op
    /// for the local `self_id` — a device must never add itself to its
    /// own peer table.
    pub fn observe(&mut self, user_id: &str, username: &str) {
        if user_id == self.self_id {
            return;
        }
        self.peers
            .entry(user_id.to_string())
            .and_modify(|p| {
                p.last_seen = Instant::now();
                p.username = username.to_string();
            })
            .or_insert_with(|| PeerEntry {
                username: username.to_string(),
                last_seen: Instant::now(),
            });
    }

    /// Returns non-expired peers. Does not mutate the table — call
    /// `sweep` to actually evict stale entries.
    pub fn snapshot(&self) -> Vec<PeerInfo> {
        let now = Instant::now();
        self.peers
            .iter()
            .filter(|(_, p)| now.duration_since(p.last_seen) <= self.expiry)
            .map(|(id, p)| PeerInfo {
                user_id: id.clone(),
                username: p.username.clone(),
            })
            .collect()
    }

    /// Removes entries with `now - lastSeen > expiry`.
    pub fn sweep(&mut self) {
        let now = Instant::now();
        let expiry = self.expiry;
        self.peers
            .retain(|_, p| now.duration_since(p.last_seen) <= expiry);
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.peers.contains_key(user_id)
    }
}
