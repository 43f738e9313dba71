//! Presence table: who holds which display name in which namespace.
//!
//! Two partitions: the public lobby, and one map per private room. A
//! connection lives in at most one of them at a time.

use std::collections::{BTreeSet, HashMap, HashSet};

use lanchat_types::models::UserEntry;

use crate::dispatcher::ConnId;
use crate::error::JoinError;
use crate::namespace::Namespace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Unique for the process lifetime, increasing in join order.
    pub id: u64,
    pub name: String,
    pub namespace: Namespace,
}

impl User {
    pub fn to_entry(&self) -> UserEntry {
        UserEntry {
            id: self.id,
            user: self.name.clone(),
            kind: self.namespace.kind(),
            chat_id: self.namespace.transport_room().to_string(),
        }
    }
}

/// Successful [`PresenceTable::join`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Joined {
    /// Canonical name, possibly suffixed to resolve a collision.
    pub name: String,
    pub renamed: bool,
    /// The connection already had a name; nothing changed.
    pub already_joined: bool,
}

#[derive(Debug, Default)]
struct Slot {
    user: Option<User>,
    /// Disconnected, waiting out the reconnect grace period.
    pending: bool,
}

impl Slot {
    fn live_name(&self) -> Option<&str> {
        match &self.user {
            Some(user) if !self.pending => Some(&user.name),
            _ => None,
        }
    }
}

type Partition = HashMap<ConnId, Slot>;

#[derive(Debug, Default)]
pub struct PresenceTable {
    public: Partition,
    rooms: HashMap<String, Partition>,
    located: HashMap<ConnId, Namespace>,
    next_id: u64,
}

impl PresenceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `conn` without a name. Any earlier registration of the same
    /// connection is dropped first.
    pub fn admit(&mut self, conn: ConnId, namespace: Namespace) {
        self.remove(conn);
        self.partition_mut(&namespace).insert(conn, Slot::default());
        self.located.insert(conn, namespace);
    }

    /// Claim `name` for an admitted connection.
    ///
    /// In the public lobby a name held by another live connection is
    /// resolved by suffixing (`Bob` becomes `Bob_2`). Private rooms refuse
    /// the join instead.
    pub fn join(&mut self, conn: ConnId, name: &str) -> Result<Joined, JoinError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(JoinError::EmptyName);
        }
        let namespace = self.located.get(&conn).cloned().ok_or(JoinError::NotAdmitted)?;

        let assigned = {
            let partition = self.partition(&namespace).ok_or(JoinError::NotAdmitted)?;
            let slot = partition.get(&conn).ok_or(JoinError::NotAdmitted)?;
            if let Some(user) = &slot.user {
                return Ok(Joined {
                    name: user.name.clone(),
                    renamed: false,
                    already_joined: true,
                });
            }

            let taken = partition
                .iter()
                .any(|(other, slot)| *other != conn && slot.live_name() == Some(name));

            match (&namespace, taken) {
                (_, false) => name.to_string(),
                (Namespace::Private(_), true) => return Err(JoinError::NameTaken(name.to_string())),
                (Namespace::Public, true) => free_suffixed_name(partition, name),
            }
        };

        self.next_id += 1;
        let user = User {
            id: self.next_id,
            name: assigned.clone(),
            namespace: namespace.clone(),
        };
        if let Some(slot) = self.partition_mut(&namespace).get_mut(&conn) {
            slot.user = Some(user);
        }

        Ok(Joined {
            renamed: assigned != name,
            name: assigned,
            already_joined: false,
        })
    }

    /// Drop `conn` entirely. Returns its user if it had joined.
    pub fn remove(&mut self, conn: ConnId) -> Option<User> {
        let namespace = self.located.remove(&conn)?;
        let slot = match &namespace {
            Namespace::Public => self.public.remove(&conn),
            Namespace::Private(room_id) => {
                let partition = self.rooms.get_mut(room_id)?;
                let slot = partition.remove(&conn);
                if partition.is_empty() {
                    self.rooms.remove(room_id);
                }
                slot
            }
        };
        slot.and_then(|slot| slot.user)
    }

    /// Flag a named public connection as disconnected-but-held.
    pub fn mark_pending(&mut self, conn: ConnId) -> Option<User> {
        let slot = self.public.get_mut(&conn)?;
        let user = slot.user.clone()?;
        slot.pending = true;
        Some(user)
    }

    pub fn is_pending(&self, conn: ConnId) -> bool {
        self.public.get(&conn).is_some_and(|slot| slot.pending)
    }

    pub fn namespace_of(&self, conn: ConnId) -> Option<&Namespace> {
        self.located.get(&conn)
    }

    pub fn user(&self, conn: ConnId) -> Option<&User> {
        let namespace = self.located.get(&conn)?;
        self.partition(namespace)?.get(&conn)?.user.as_ref()
    }

    /// Named occupants of `namespace` in join order.
    ///
    /// The public lobby is deduplicated by name (earliest wins) because one
    /// person may briefly hold a stale connection next to a fresh one.
    pub fn list_audience(&self, namespace: &Namespace) -> Vec<User> {
        let Some(partition) = self.partition(namespace) else {
            return Vec::new();
        };
        let mut users: Vec<User> = partition.values().filter_map(|slot| slot.user.clone()).collect();
        users.sort_by_key(|user| user.id);

        if let Namespace::Public = namespace {
            let mut seen = HashSet::new();
            users.retain(|user| seen.insert(user.name.clone()));
        }
        users
    }

    /// Live (not pending) connections holding `name` in `namespace`.
    pub fn live_connections_named(&self, namespace: &Namespace, name: &str) -> Vec<ConnId> {
        self.partition(namespace)
            .map(|partition| {
                partition
                    .iter()
                    .filter(|(_, slot)| slot.live_name() == Some(name))
                    .map(|(conn, _)| *conn)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn has_live_name(&self, namespace: &Namespace, name: &str) -> bool {
        !self.live_connections_named(namespace, name).is_empty()
    }

    /// Every connection registered in `namespace`, named or not.
    pub fn connections(&self, namespace: &Namespace) -> Vec<ConnId> {
        self.partition(namespace)
            .map(|partition| partition.keys().copied().collect())
            .unwrap_or_default()
    }

    /// Display names currently occupying a private room.
    pub fn room_membership(&self, room_id: &str) -> BTreeSet<String> {
        self.rooms
            .get(room_id)
            .map(|partition| {
                partition
                    .values()
                    .filter_map(|slot| slot.user.as_ref().map(|user| user.name.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.located.len()
    }

    pub fn is_empty(&self) -> bool {
        self.located.is_empty()
    }

    fn partition(&self, namespace: &Namespace) -> Option<&Partition> {
        match namespace {
            Namespace::Public => Some(&self.public),
            Namespace::Private(room_id) => self.rooms.get(room_id),
        }
    }

    fn partition_mut(&mut self, namespace: &Namespace) -> &mut Partition {
        match namespace {
            Namespace::Public => &mut self.public,
            Namespace::Private(room_id) => self.rooms.entry(room_id.clone()).or_default(),
        }
    }
}

/// First `name_N` (N >= 2) not held by anyone in the partition, pending
/// holders included so a reconnecting user keeps their name.
fn free_suffixed_name(partition: &Partition, name: &str) -> String {
    let held: HashSet<&str> = partition
        .values()
        .filter_map(|slot| slot.user.as_ref().map(|user| user.name.as_str()))
        .collect();

    (2u64..)
        .map(|n| format!("{name}_{n}"))
        .find(|candidate| !held.contains(candidate.as_str()))
        .unwrap_or_else(|| name.to_string())
}
