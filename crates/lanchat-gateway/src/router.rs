//! Message routing: audience resolution, @mention extraction and history
//! append for chat lines.

use std::collections::HashSet;

use lanchat_types::events::ServerEvent;
use lanchat_types::models::{EntryKind, HistoryEntry};

use crate::dispatcher::{ConnId, Transport};
use crate::error::RouteError;
use crate::history::HistoryStore;
use crate::namespace::Namespace;
use crate::presence::{PresenceTable, User};

/// A chat line that has been accepted and recorded, with everyone it must
/// reach.
#[derive(Debug, Clone)]
pub struct Routed {
    pub namespace: Namespace,
    pub entry: HistoryEntry,
    /// See [`audience_connections`].
    pub recipients: Vec<ConnId>,
    /// Connections of mentioned users, each also in `recipients`.
    pub mentioned: Vec<ConnId>,
}

/// Connections that receive broadcasts for `namespace`.
///
/// Always a subset of the transport's room view, so a presence entry that
/// outlived its socket never receives anything. The public lobby further
/// narrows it to connections that joined with a name; a private room
/// reaches every connection admitted to it.
pub fn audience_connections<T: Transport>(
    transport: &T,
    presence: &PresenceTable,
    namespace: &Namespace,
) -> Vec<ConnId> {
    let mut members = transport.room_members(namespace.transport_room());
    if let Namespace::Public = namespace {
        members.retain(|conn| presence.user(*conn).is_some());
    }
    members
}

/// `@name` tokens in `content` naming a member of `audience`, in order of
/// first appearance. Self-mentions and unknown names are dropped.
pub fn extract_mentions(content: &str, sender: &str, audience: &[User]) -> Vec<String> {
    let members: HashSet<&str> = audience.iter().map(|user| user.name.as_str()).collect();
    let mut seen = HashSet::new();

    content
        .split_whitespace()
        .filter_map(|token| token.strip_prefix('@'))
        .filter(|name| *name != sender && members.contains(name))
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect()
}

/// Accept a chat line from `sender` and append it to its namespace's ring.
///
/// Clients cannot author system lines; those are downgraded to user lines.
pub fn route<T: Transport>(
    presence: &PresenceTable,
    history: &mut HistoryStore,
    transport: &T,
    sender: ConnId,
    kind: EntryKind,
    content: String,
    now: i64,
) -> Result<Routed, RouteError> {
    let author = presence.user(sender).ok_or(RouteError::StaleSender(sender))?;
    if content.trim().is_empty() {
        return Err(RouteError::EmptyContent);
    }
    let namespace = author.namespace.clone();
    let kind = match kind {
        EntryKind::System => EntryKind::User,
        other => other,
    };

    let audience = presence.list_audience(&namespace);
    let mentions = extract_mentions(&content, &author.name, &audience);

    let recipients = audience_connections(transport, presence, &namespace);
    let mentioned = mentions
        .iter()
        .flat_map(|name| presence.live_connections_named(&namespace, name))
        .filter(|conn| recipients.contains(conn))
        .collect();

    let entry = HistoryEntry {
        author: Some(author.name.clone()),
        kind,
        content,
        timestamp: now,
        mentions,
        highlight: None,
        action: None,
    };
    history.ring_mut(&namespace).append(entry.clone());

    Ok(Routed {
        namespace,
        entry,
        recipients,
        mentioned,
    })
}

/// Send the line to the room and the mention notices to their targets.
pub fn deliver<T: Transport>(transport: &T, routed: &Routed) {
    for conn in &routed.recipients {
        transport.emit(*conn, ServerEvent::Message(routed.entry.clone()));
    }

    let from = routed.entry.author.clone().unwrap_or_default();
    for conn in &routed.mentioned {
        transport.emit(
            *conn,
            ServerEvent::Mentioned {
                from: from.clone(),
                message: routed.entry.content.clone(),
            },
        );
    }
}
