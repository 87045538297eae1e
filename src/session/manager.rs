//! Session manager: message dispatch, room membership, privacy
//! toggling, local room state machine.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::config::SessionConfig;
use crate::events::{EngineEvent, PendingInvite};
use crate::peer::{PeerInfo, PeerTable};
use crate::session::cipher;
use crate::session::datagram::Datagram;

/// The session layer's own peer-expiry, distinct from the shorter
/// discovery-layer expiry the engine shell tracks separately.
pub const CONNECTED_USER_EXPIRY: Duration = Duration::from_secs(30);
/// Duplicate `messageId` suppression window.
const MESSAGE_ID_RECENCY_WINDOW: Duration = Duration::from_secs(60);
/// Chat history bound; a display-side cap on top of this is the host's
/// own concern.
const CHAT_HISTORY_CAP: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub members: HashSet<String>,
    pub created_by: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub message_id: String,
    pub room_id: String,
    pub from_user_id: String,
    pub from_username: String,
    pub content: String,
    pub is_encrypted: bool,
    pub timestamp: u64,
}

pub struct SessionManager {
    self_user_id: String,
    self_username: String,
    current_room: Option<Room>,
    encryption_key: Option<String>,
    connected_users: PeerTable,
    history: VecDeque<ChatMessage>,
    recent_message_ids: VecDeque<(String, Instant)>,
}

impl SessionManager {
    pub fn new(config: &SessionConfig, self_user_id: String) -> Self {
        Self {
            self_username: config.username.clone(),
            connected_users: PeerTable::new(self_user_id.clone(), CONNECTED_USER_EXPIRY),
            self_user_id,
            current_room: None,
            encryption_key: None,
            history: VecDeque::with_capacity(CHAT_HISTORY_CAP),
            recent_message_ids: VecDeque::new(),
        }
    }

    pub fn self_user_id(&self) -> &str {
        &self.self_user_id
    }

    pub fn current_room(&self) -> Option<&Room> {
        self.current_room.as_ref()
    }

    pub fn is_private(&self) -> bool {
        self.current_room
            .as_ref()
            .map(|r| r.is_private)
            .unwrap_or(false)
    }

    pub fn connected_peers(&self) -> Vec<PeerInfo> {
        self.connected_users.snapshot()
    }

    pub fn sweep_connected_users(&mut self) {
        self.connected_users.sweep();
    }

    pub fn history(&self) -> impl Iterator<Item = &ChatMessage> {
        self.history.iter()
    }

    // --- Outgoing datagram construction (delegated to by the façade) ---

    pub fn build_heartbeat(&self, timestamp: u64) -> Datagram {
        Datagram::Heartbeat {
            user_id: self.self_user_id.clone(),
            username: self.self_username.clone(),
            timestamp,
        }
    }

    pub fn build_discovery(&self, timestamp: u64) -> Datagram {
        Datagram::Discovery {
            user_id: self.self_user_id.clone(),
            username: self.self_username.clone(),
            timestamp,
        }
    }

    /// Periodic public-room advertisement. Returns `None` outside of a
    /// public room.
    pub fn build_room_update(&self, timestamp: u64) -> Option<Datagram> {
        let room = self.current_room.as_ref()?;
        if room.is_private {
            return None;
        }
        Some(Datagram::RoomUpdate {
            room_id: room.id.clone(),
            room_name: room.name.clone(),
            is_private: false,
            member_count: room.members.len() as u32,
            created_by: room.created_by.clone(),
            timestamp,
        })
    }

    pub fn create_or_join_room(
        &mut self,
        room_id: String,
        room_name: String,
        is_private: bool,
        timestamp: u64,
    ) -> (Datagram, EngineEvent) {
        let mut members = HashSet::new();
        members.insert(self.self_user_id.clone());
        self.encryption_key = if is_private {
            Some(cipher::generate_key())
        } else {
            None
        };
        self.current_room = Some(Room {
            id: room_id.clone(),
            name: room_name,
            is_private,
            members,
            created_by: self.self_user_id.clone(),
            created_at: timestamp,
        });
        let announce = Datagram::JoinRoom {
            user_id: self.self_user_id.clone(),
            username: self.self_username.clone(),
            room_id: room_id.clone(),
            timestamp,
        };
        (
            announce,
            EngineEvent::RoomStateChanged {
                room_id: Some(room_id),
                is_private,
            },
        )
    }

    pub fn invite_peer(&self, to_user_id: String, timestamp: u64) -> Option<Datagram> {
        let room = self.current_room.as_ref()?;
        Some(Datagram::Invite {
            from_user_id: self.self_user_id.clone(),
            from_username: self.self_username.clone(),
            to_user_id,
            room_id: room.id.clone(),
            room_name: room.name.clone(),
            is_private: room.is_private,
            key: self.encryption_key.clone(),
            timestamp,
        })
    }

    pub fn accept_invite(&mut self, invite: PendingInvite, timestamp: u64) -> (Datagram, EngineEvent) {
        let mut members = HashSet::new();
        members.insert(self.self_user_id.clone());
        members.insert(invite.from_user_id.clone());
        self.encryption_key = invite.key.clone();
        self.current_room = Some(Room {
            id: invite.room_id.clone(),
            name: invite.room_name,
            is_private: invite.is_private,
            members,
            created_by: invite.from_user_id,
            created_at: timestamp,
        });
        let announce = Datagram::JoinRoom {
            user_id: self.self_user_id.clone(),
            username: self.self_username.clone(),
            room_id: invite.room_id.clone(),
            timestamp,
        };
        (
            announce,
            EngineEvent::RoomStateChanged {
                room_id: Some(invite.room_id),
                is_private: invite.is_private,
            },
        )
    }

    pub fn leave_room(&mut self, timestamp: u64) -> Option<(Datagram, EngineEvent)> {
        let room = self.current_room.take()?;
        self.encryption_key = None;
        let announce = Datagram::LeaveRoom {
            user_id: self.self_user_id.clone(),
            username: self.self_username.clone(),
            room_id: room.id,
            timestamp,
        };
        Some((
            announce,
            EngineEvent::RoomStateChanged {
                room_id: None,
                is_private: false,
            },
        ))
    }

    /// Entering private mode generates a fresh key and emits
    /// `private_key`; leaving it clears the key locally without
    /// retroactively decrypting past messages.
    pub fn toggle_privacy(&mut self, timestamp: u64) -> Option<(Option<Datagram>, Vec<EngineEvent>)> {
        let room = self.current_room.as_mut()?;
        room.is_private = !room.is_private;
        let room_id = room.id.clone();
        let now_private = room.is_private;

        let mut events = Vec::new();
        let outgoing = if now_private {
            let key = cipher::generate_key();
            self.encryption_key = Some(key.clone());
            events.push(EngineEvent::SystemMessage {
                text: "Private mode enabled".to_string(),
            });
            Some(Datagram::PrivateKey {
                room_id: room_id.clone(),
                key,
                timestamp,
            })
        } else {
            self.encryption_key = None;
            events.push(EngineEvent::SystemMessage {
                text: "Private mode disabled".to_string(),
            });
            None
        };
        events.push(EngineEvent::RoomStateChanged {
            room_id: Some(room_id),
            is_private: now_private,
        });
        Some((outgoing, events))
    }

    /// Builds an outgoing chat frame, encrypting it if the current room
    /// is private.
    pub fn send_chat(&self, text: &str, message_id: String, timestamp: u64) -> Option<Datagram> {
        let room = self.current_room.as_ref()?;
        let is_encrypted = room.is_private;
        let content = if is_encrypted {
            let key = self.encryption_key.as_ref()?;
            cipher::encrypt_content(text, key)
        } else {
            text.to_string()
        };
        Some(Datagram::Chat {
            message_id,
            room_id: room.id.clone(),
            from_user_id: self.self_user_id.clone(),
            from_username: self.self_username.clone(),
            content,
            is_encrypted,
            timestamp,
        })
    }

    /// Routes an incoming datagram by `type`, applying the delivery
    /// rules: room scoping, self-loopback suppression, and duplicate
    /// `messageId` suppression.
    pub fn dispatch(&mut self, datagram: Datagram, now: Instant) -> Vec<EngineEvent> {
        let mut events = Vec::new();

        if let Datagram::Heartbeat { user_id, username, .. }
        | Datagram::Discovery { user_id, username, .. } = &datagram
        {
            if user_id != &self.self_user_id {
                self.connected_users.observe(user_id, username);
                events.push(EngineEvent::PeerListChanged {
                    peers: self.connected_users.snapshot(),
                });
            }
            return events;
        }

        if let Some(from) = datagram.from_user_id() {
            if from == self.self_user_id {
                return events; // drop acoustic self-echo.
            }
        }

        // Invite and RoomUpdate are meant to be heard while *not* in the
        // room they name (that's the point of an invite, and of an
        // advertisement to "new listeners"); every other room-scoped type
        // is dropped unless it matches the room we are actually in.
        let exempt_from_room_scoping =
            matches!(datagram, Datagram::Invite { .. } | Datagram::RoomUpdate { .. });
        if !exempt_from_room_scoping {
            if let Some(room_id) = datagram.room_id() {
                match &self.current_room {
                    Some(room) if room.id == room_id => {}
                    _ => return events,
                }
            }
        }

        match datagram {
            Datagram::Invite {
                from_user_id,
                from_username,
                to_user_id,
                room_id,
                room_name,
                is_private,
                key,
                ..
            } => {
                if to_user_id == self.self_user_id {
                    events.push(EngineEvent::InviteReceived {
                        invite: PendingInvite {
                            from_user_id,
                            from_username,
                            room_id,
                            room_name,
                            is_private,
                            key,
                        },
                    });
                }
            }
            Datagram::JoinRoom {
                user_id,
                username,
                room_id,
                ..
            } => {
                if let Some(room) = self.current_room.as_mut() {
                    room.members.insert(user_id);
                    let members: Vec<String> = room.members.iter().cloned().collect();
                    events.push(EngineEvent::SystemMessage {
                        text: format!("{} joined the room", username),
                    });
                    events.push(EngineEvent::RoomMembersChanged { room_id, members });
                }
            }
            Datagram::LeaveRoom {
                user_id,
                username,
                room_id,
                ..
            } => {
                if let Some(room) = self.current_room.as_mut() {
                    room.members.remove(&user_id);
                    let members: Vec<String> = room.members.iter().cloned().collect();
                    events.push(EngineEvent::SystemMessage {
                        text: format!("{} left the room", username),
                    });
                    events.push(EngineEvent::RoomMembersChanged { room_id, members });
                }
            }
            Datagram::RoomUpdate {
                room_id,
                room_name,
                member_count,
                created_by,
                ..
            } => {
                events.push(EngineEvent::RoomAdvertised {
                    room_id,
                    room_name,
                    member_count,
                    created_by,
                });
            }
            Datagram::PrivateKey { room_id, key, .. } => {
                if let Some(room) = self.current_room.as_mut() {
                    room.is_private = true;
                    self.encryption_key = Some(key);
                    events.push(EngineEvent::RoomStateChanged {
                        room_id: Some(room_id),
                        is_private: true,
                    });
                }
            }
            Datagram::Chat {
                message_id,
                from_user_id,
                from_username,
                content,
                is_encrypted,
                timestamp,
                room_id,
            } => {
                if self.is_duplicate_message(&message_id, now) {
                    return events;
                }
                self.remember_message_id(message_id.clone(), now);

                let displayed = if is_encrypted {
                    match self.encryption_key.as_ref() {
                        Some(key) => cipher::decrypt_content(&content, key)
                            .unwrap_or_else(|_| "[encrypted — undecryptable]".to_string()),
                        None => "[encrypted — undecryptable]".to_string(),
                    }
                } else {
                    content.clone()
                };

                self.remember_chat(ChatMessage {
                    message_id,
                    room_id,
                    from_user_id: from_user_id.clone(),
                    from_username: from_username.clone(),
                    content: displayed.clone(),
                    is_encrypted,
                    timestamp,
                });

                events.push(EngineEvent::ChatReceived {
                    from_user_id,
                    from_username,
                    content: displayed,
                    is_encrypted,
                });
            }
            Datagram::Heartbeat { .. } | Datagram::Discovery { .. } => unreachable!(
                "heartbeat/discovery are handled above before room-scoping"
            ),
        }

        events
    }

    fn is_duplicate_message(&mut self, message_id: &str, now: Instant) -> bool {
        self.prune_recent_message_ids(now);
        self.recent_message_ids
            .iter()
            .any(|(id, _)| id == message_id)
    }

    fn remember_message_id(&mut self, message_id: String, now: Instant) {
        self.recent_message_ids.push_back((message_id, now));
    }

    fn prune_recent_message_ids(&mut self, now: Instant) {
        while let Some((_, seen_at)) = self.recent_message_ids.front() {
            if now.duration_since(*seen_at) > MESSAGE_ID_RECENCY_WINDOW {
                self.recent_message_ids.pop_front();
            } else {
                break;
            }
        }
    }

    fn remember_chat(&mut self, message: ChatMessage) {
        if self.history.len() >= CHAT_HISTORY_CAP {
            self.history.pop_front();
        }
        self.history.push_back(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(user_id: &str, username: &str) -> SessionManager {
        SessionManager::new(&SessionConfig::new(username), user_id.to_string())
    }

    #[test]
    fn heartbeat_populates_connected_users_not_self() {
        let mut a = manager("A", "Alice");
        let events = a.dispatch(
            Datagram::Heartbeat {
                user_id: "B".into(),
                username: "Bob".into(),
                timestamp: 1,
            },
            Instant::now(),
        );
        assert_eq!(a.connected_peers().len(), 1);
        assert!(matches!(events[0], EngineEvent::PeerListChanged { .. }));

        let events = a.dispatch(
            Datagram::Heartbeat {
                user_id: "A".into(),
                username: "Alice".into(),
                timestamp: 2,
            },
            Instant::now(),
        );
        assert_eq!(a.connected_peers().len(), 1); // unchanged: self is a no-op
        assert!(events.is_empty());
    }

    #[test]
    fn invite_then_join_adds_the_invitee_as_a_member() {
        let mut a = manager("A", "Alice");
        let (join_dg, _) = a.create_or_join_room("room42".into(), "Chat room room42".into(), false, 0);
        assert!(matches!(join_dg, Datagram::JoinRoom { .. }));

        let invite = a.invite_peer("B".into(), 10).unwrap();
        if let Datagram::Invite { to_user_id, room_id, .. } = &invite {
            assert_eq!(to_user_id, "B");
            assert_eq!(room_id, "room42");
        } else {
            panic!("expected invite");
        }

        // B accepts and announces join_room, which A then dispatches.
        let events = a.dispatch(
            Datagram::JoinRoom {
                user_id: "B".into(),
                username: "Bob".into(),
                room_id: "room42".into(),
                timestamp: 20,
            },
            Instant::now(),
        );
        let members = a.current_room().unwrap().members.clone();
        assert_eq!(members, HashSet::from(["A".to_string(), "B".to_string()]));
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::SystemMessage { text } if text == "B joined the room")));
    }

    #[test]
    fn public_chat_is_cleartext() {
        let mut a = manager("A", "Alice");
        a.create_or_join_room("room42".into(), "Chat room room42".into(), false, 0);
        let dg = a.send_chat("hello", "m1".into(), 5).unwrap();
        if let Datagram::Chat { content, is_encrypted, .. } = dg {
            assert_eq!(content, "hello");
            assert!(!is_encrypted);
        } else {
            panic!("expected chat");
        }
    }

    #[test]
    fn private_chat_round_trips_through_the_obfuscation_cipher() {
        let mut a = manager("A", "Alice");
        let mut b = manager("B", "Bob");

        a.create_or_join_room("room42".into(), "room".into(), false, 0);
        // B joins via accept_invite to seed its own matching room state.
        let invite = PendingInvite {
            from_user_id: "A".into(),
            from_username: "Alice".into(),
            room_id: "room42".into(),
            room_name: "room".into(),
            is_private: false,
            key: None,
        };
        b.accept_invite(invite, 0);

        let (privkey_dg, _) = a.toggle_privacy(1).unwrap();
        let privkey_dg = privkey_dg.unwrap();
        b.dispatch(privkey_dg, Instant::now());
        assert!(b.current_room().unwrap().is_private);

        let chat_dg = a.send_chat("hi", "m2".into(), 2).unwrap();
        if let Datagram::Chat { ref content, .. } = chat_dg {
            assert_eq!(content, "0302");
        }
        let events = b.dispatch(chat_dg, Instant::now());
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::ChatReceived { content, .. } if content == "hi")));
    }

    #[test]
    fn self_loopback_chat_is_dropped() {
        let mut a = manager("A", "Alice");
        a.create_or_join_room("room42".into(), "room".into(), false, 0);
        let events = a.dispatch(
            Datagram::Chat {
                message_id: "m1".into(),
                room_id: "room42".into(),
                from_user_id: "A".into(),
                from_username: "Alice".into(),
                content: "echo".into(),
                is_encrypted: false,
                timestamp: 1,
            },
            Instant::now(),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn duplicate_message_id_is_suppressed() {
        let mut a = manager("A", "Alice");
        a.create_or_join_room("room42".into(), "room".into(), false, 0);
        let make = || Datagram::Chat {
            message_id: "dup".into(),
            room_id: "room42".into(),
            from_user_id: "B".into(),
            from_username: "Bob".into(),
            content: "hi".into(),
            is_encrypted: false,
            timestamp: 1,
        };
        let now = Instant::now();
        let first = a.dispatch(make(), now);
        let second = a.dispatch(make(), now);
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn chat_outside_current_room_is_ignored() {
        let mut a = manager("A", "Alice");
        a.create_or_join_room("room42".into(), "room".into(), false, 0);
        let events = a.dispatch(
            Datagram::Chat {
                message_id: "m1".into(),
                room_id: "other-room".into(),
                from_user_id: "B".into(),
                from_username: "Bob".into(),
                content: "hi".into(),
                is_encrypted: false,
                timestamp: 1,
            },
            Instant::now(),
        );
        assert!(events.is_empty());
    }

    #[test]
    fn decrypt_without_key_yields_placeholder() {
        let mut a = manager("A", "Alice");
        a.create_or_join_room("room42".into(), "room".into(), false, 0);
        let events = a.dispatch(
            Datagram::Chat {
                message_id: "m1".into(),
                room_id: "room42".into(),
                from_user_id: "B".into(),
                from_username: "Bob".into(),
                content: "0302".into(),
                is_encrypted: true,
                timestamp: 1,
            },
            Instant::now(),
        );
        assert!(events.iter().any(
            |e| matches!(e, EngineEvent::ChatReceived { content, .. } if content == "[encrypted — undecryptable]")
        ));
    }

    #[test]
    fn toggle_to_public_clears_key_without_retroactive_decryption() {
        let mut a = manager("A", "Alice");
        a.create_or_join_room("room42".into(), "room".into(), true, 0);
        assert!(a.is_private());
        let (dg, _) = a.toggle_privacy(1).unwrap();
        assert!(dg.is_none()); // going public emits no private_key frame
        assert!(!a.is_private());
    }

    #[test]
    fn leave_room_resets_state_machine_to_idle() {
        let mut a = manager("A", "Alice");
        a.create_or_join_room("room42".into(), "room".into(), false, 0);
        assert!(a.current_room().is_some());
        a.leave_room(1);
        assert!(a.current_room().is_none());
        assert!(a.send_chat("hi", "m1".into(), 2).is_none());
    }
}
