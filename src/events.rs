//! The single host-facing event channel: one tagged variant type instead
//! of a callback slot per purpose, delivered through
//! `EngineEventCallback::on_event`.

use crate::peer::PeerInfo;

/// An invite the façade surfaced to the host; round-tripped back into
/// `AcousticEngine::accept_invite` verbatim.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct PendingInvite {
    pub from_user_id: String,
    pub from_username: String,
    pub room_id: String,
    pub room_name: String,
    pub is_private: bool,
    pub key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, uniffi::Enum)]
pub enum EngineEvent {
    /// The discovery peer table changed shape.
    PeerListChanged { peers: Vec<PeerInfo> },
    InviteReceived { invite: PendingInvite },
    /// Local room state machine transitioned.
    RoomStateChanged { room_id: Option<String>, is_private: bool },
    RoomMembersChanged { room_id: String, members: Vec<String> },
    RoomAdvertised {
        room_id: String,
        room_name: String,
        member_count: u32,
        created_by: String,
    },
    ChatReceived {
        from_user_id: String,
        from_username: String,
        content: String,
        is_encrypted: bool,
    },
    SystemMessage { text: String },
    /// A foreground send failed. Reported once, never retried
    /// automatically.
    SendFailed { reason: String },
}
