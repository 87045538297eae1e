//! Wire datagram types. Serialised as JSON text, one object per frame
//! payload, tagged by `type`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Datagram {
    #[serde(rename = "heartbeat", rename_all = "camelCase")]
    Heartbeat {
        user_id: String,
        username: String,
        timestamp: u64,
    },
    #[serde(rename = "discovery", rename_all = "camelCase")]
    Discovery {
        user_id: String,
        username: String,
        timestamp: u64,
    },
    #[serde(rename = "invite", rename_all = "camelCase")]
    Invite {
        from_user_id: String,
        from_username: String,
        to_user_id: String,
        room_id: String,
        room_name: String,
        is_private: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        key: Option<String>,
        timestamp: u64,
    },
    #[serde(rename = "join_room", rename_all = "camelCase")]
    JoinRoom {
        user_id: String,
        username: String,
        room_id: String,
        timestamp: u64,
    },
    #[serde(rename = "leave_room", rename_all = "camelCase")]
    LeaveRoom {
        user_id: String,
        username: String,
        room_id: String,
        timestamp: u64,
    },
    #[serde(rename = "room_update", rename_all = "camelCase")]
    RoomUpdate {
        room_id: String,
        room_name: String,
        is_private: bool,
        member_count: u32,
        created_by: String,
        timestamp: u64,
    },
    #[serde(rename = "private_key", rename_all = "camelCase")]
    PrivateKey {
        room_id: String,
        key: String,
        timestamp: u64,
    },
    #[serde(rename = "chat", rename_all = "camelCase")]
    Chat {
        message_id: String,
        room_id: String,
        from_user_id: String,
        from_username: String,
        content: String,
        is_encrypted: bool,
        timestamp: u64,
    },
}

impl Datagram {
    /// The originating peer, used for self-loopback suppression.
    pub fn from_user_id(&self) -> Option<&str> {
        match self {
            Datagram::Heartbeat { user_id, .. } => Some(user_id),
            Datagram::Discovery { user_id, .. } => Some(user_id),
            Datagram::Invite { from_user_id, .. } => Some(from_user_id),
            Datagram::JoinRoom { user_id, .. } => Some(user_id),
            Datagram::LeaveRoom { user_id, .. } => Some(user_id),
            Datagram::Chat { from_user_id, .. } => Some(from_user_id),
            Datagram::RoomUpdate { .. } | Datagram::PrivateKey { .. } => None,
        }
    }

    /// The room a datagram is scoped to, used for room-scoping.
    pub fn room_id(&self) -> Option<&str> {
        match self {
            Datagram::JoinRoom { room_id, .. } => Some(room_id),
            Datagram::LeaveRoom { room_id, .. } => Some(room_id),
            Datagram::RoomUpdate { room_id, .. } => Some(room_id),
            Datagram::PrivateKey { room_id, .. } => Some(room_id),
            Datagram::Chat { room_id, .. } => Some(room_id),
            Datagram::Invite { room_id, .. } => Some(room_id),
            Datagram::Heartbeat { .. } | Datagram::Discovery { .. } => None,
        }
    }
}

/// Serialises a datagram and encodes it through the frame codec,
/// rejecting anything whose JSON form exceeds the 32 byte payload cap.
pub fn encode_datagram(datagram: &Datagram) -> Result<Vec<u8>, crate::error::CodecError> {
    let json = serde_json::to_vec(datagram).expect("Datagram serialisation is infallible");
    crate::codec::encode(&json)
}

pub fn decode_datagram(payload: &[u8]) -> Result<Datagram, crate::error::SessionError> {
    serde_json::from_slice(payload).map_err(|_| crate::error::SessionError::Malformed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_round_trips_through_json() {
        let dg = Datagram::Heartbeat {
            user_id: "a1b2c3d4e".into(),
            username: "Alice".into(),
            timestamp: 1234,
        };
        let json = serde_json::to_string(&dg).unwrap();
        assert!(json.contains("\"type\":\"heartbeat\""));
        assert!(json.contains("\"userId\":\"a1b2c3d4e\""));
        let back: Datagram = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dg);
    }

    #[test]
    fn invite_round_trips_and_fields_are_camel_case() {
        let dg = Datagram::Invite {
            from_user_id: "A".into(),
            from_username: "Alice".into(),
            to_user_id: "B".into(),
            room_id: "room42".into(),
            room_name: "Chat room room42".into(),
            is_private: false,
            key: None,
            timestamp: 42,
        };
        let json = serde_json::to_string(&dg).unwrap();
        assert!(json.contains("\"fromUserId\":\"A\""));
        assert!(json.contains("\"toUserId\":\"B\""));
        assert!(!json.contains("\"key\""));
        let back: Datagram = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dg);
    }

    #[test]
    fn malformed_payload_is_reported_not_panicked() {
        let result = decode_datagram(b"not json");
        assert!(result.is_err());
    }

    #[test]
    fn datagram_too_large_is_rejected_before_the_wire() {
        let dg = Datagram::Chat {
            message_id: "m1".into(),
            room_id: "room-with-a-very-long-identifier".into(),
            from_user_id: "A".into(),
            from_username: "Alice".into(),
            content: "hello there, this content is long enough to overflow".into(),
            is_encrypted: false,
            timestamp: 1,
        };
        assert!(encode_datagram(&dg).is_err());
    }
}
