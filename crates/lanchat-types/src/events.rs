use serde::{Deserialize, Serialize};

use crate::models::{EntryKind, HistoryEntry, UserEntry};

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Public history sent right after a public-lobby connection is admitted
    History(Vec<HistoryEntry>),

    /// Current occupants of the caller's namespace
    UserList(Vec<UserEntry>),

    /// Full history of the caller's namespace, on request
    ChatHistory(Vec<HistoryEntry>),

    /// A chat line or a join/leave announcement
    Message(HistoryEntry),

    /// The recipient was @mentioned in `message`
    Mentioned { from: String, message: String },

    /// A request from this connection was refused
    Error {
        #[serde(rename = "type")]
        kind: ErrorKind,
        message: String,
    },

    /// The requested display name was taken; this one was assigned instead
    NameChanged(String),

    /// The connection was admitted into `room`
    ConnectionConfirmed {
        room: String,
        #[serde(rename = "isPrivate")]
        is_private: bool,
    },

    /// Acknowledges a `createRoom` command
    RoomCreated {
        #[serde(rename = "roomId")]
        room_id: String,
        created: bool,
    },

    VoiceCallJoin(VoiceCall),
    VoiceCallLeave(VoiceCall),
    VoiceCallEnd(VoiceCall),
    VoiceCallMute(VoiceCall),
    VoiceCallAudio(VoiceCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Auth,
    Name,
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum ClientCommand {
    RequestUserList,

    RequestHistory,

    /// Claim a display name in the connection's namespace
    Join(String),

    Message {
        /// Missing means an ordinary chat line.
        #[serde(rename = "type", default)]
        kind: EntryKind,
        #[serde(default)]
        content: String,
    },

    CreateRoom {
        #[serde(rename = "roomId")]
        room_id: String,
        #[serde(default)]
        password: Option<String>,
        #[serde(rename = "passNeedId", default)]
        pass_need_id: Option<String>,
    },

    VoiceCallJoin(VoiceCall),
    VoiceCallLeave(VoiceCall),
    VoiceCallEnd(VoiceCall),
    VoiceCallMute(VoiceCall),
    VoiceCallAudio(VoiceCall),
}

/// Voice-call signaling payload. The server relays it without interpreting
/// anything but the timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceCall {
    #[serde(rename = "callId")]
    pub call_id: String,
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub muted: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}
