use std::fmt;

use lanchat_types::models::NamespaceKind;

/// Transport room every public-lobby connection joins.
pub const PUBLIC_ROOM: &str = "public";

/// The unit within which display names must be unique.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Namespace {
    Public,
    Private(String),
}

impl Namespace {
    /// Resolve the `chat_id` handshake parameter.
    pub fn from_chat_id(chat_id: Option<&str>) -> Self {
        match chat_id {
            None | Some(PUBLIC_ROOM) | Some("") => Self::Public,
            Some(room_id) => Self::Private(room_id.to_string()),
        }
    }

    /// Name of the transport room backing this namespace.
    pub fn transport_room(&self) -> &str {
        match self {
            Self::Public => PUBLIC_ROOM,
            Self::Private(room_id) => room_id,
        }
    }

    pub fn is_private(&self) -> bool {
        matches!(self, Self::Private(_))
    }

    pub fn kind(&self) -> NamespaceKind {
        match self {
            Self::Public => NamespaceKind::Public,
            Self::Private(_) => NamespaceKind::Private,
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Public => f.write_str(PUBLIC_ROOM),
            Self::Private(room_id) => write!(f, "room:{room_id}"),
        }
    }
}
