use serde::{Deserialize, Serialize};

/// What kind of line a history entry represents.
///
/// Clients post `"text"` for ordinary chat lines (older clients send
/// `"user"`), and `"file"` after a successful upload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    #[serde(rename = "system")]
    System,
    #[default]
    #[serde(rename = "text", alias = "user")]
    User,
    #[serde(rename = "file")]
    File,
}

/// Join/leave marker carried by system announcements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresenceAction {
    Join,
    Leave,
}

/// A single line of chat history, as stored in a history ring and as sent to
/// clients in `message`, `history` and `chatHistory` events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Display name of the author. `None` for server announcements.
    #[serde(rename = "user", default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub content: String,
    /// Milliseconds since the unix epoch.
    pub timestamp: i64,
    #[serde(default)]
    pub mentions: Vec<String>,
    /// Name the client should emphasise when rendering a system line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<PresenceAction>,
}

impl HistoryEntry {
    /// Server-generated join/leave announcement.
    pub fn announcement(name: &str, action: PresenceAction, private: bool, timestamp: i64) -> Self {
        let content = match (action, private) {
            (PresenceAction::Join, false) => format!("{name} joined the chat"),
            (PresenceAction::Join, true) => format!("{name} joined the private room"),
            (PresenceAction::Leave, false) => format!("{name} left the chat"),
            (PresenceAction::Leave, true) => format!("{name} left the private room"),
        };

        Self {
            author: None,
            kind: EntryKind::System,
            content,
            timestamp,
            mentions: Vec::new(),
            highlight: Some(name.to_string()),
            action: Some(action),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamespaceKind {
    Public,
    Private,
}

/// One row of a `userList` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub id: u64,
    pub user: String,
    #[serde(rename = "type")]
    pub kind: NamespaceKind,
    pub chat_id: String,
}
