//! Room registry: password-gated private rooms, alive for the process
//! lifetime.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::error::AuthError;

#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    password: Option<String>,
    pub password_required: bool,
    /// Creation time, unix milliseconds.
    pub created_at: i64,
    /// Set once the room admits its first connection.
    entered: bool,
}

/// Result of [`RoomRegistry::create_room`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomHandle {
    pub room_id: String,
    /// `false` when the room already existed and was left untouched.
    pub created: bool,
    pub password_required: bool,
}

/// Answer to a room-existence query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoomStatus {
    pub exists: bool,
    pub needs_password: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    Allowed,
    NeedsPassword,
    WrongPassword,
    NotFound,
}

impl AuthOutcome {
    pub fn into_result(self) -> Result<(), AuthError> {
        match self {
            Self::Allowed => Ok(()),
            Self::NeedsPassword => Err(AuthError::NeedPassword),
            Self::WrongPassword => Err(AuthError::WrongPassword),
            Self::NotFound => Err(AuthError::RoomNotFound),
        }
    }
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<String, Room>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `room_id` unless it already exists.
    ///
    /// The first writer wins: re-creating an existing id never touches its
    /// password. A room requires a password when one is given, unless the
    /// client marked the requirement off with `pass_need = "false"`.
    pub fn create_room(
        &mut self,
        room_id: &str,
        password: Option<&str>,
        pass_need: Option<&str>,
        now: i64,
    ) -> RoomHandle {
        match self.rooms.entry(room_id.to_string()) {
            Entry::Occupied(existing) => RoomHandle {
                room_id: room_id.to_string(),
                created: false,
                password_required: existing.get().password_required,
            },
            Entry::Vacant(slot) => {
                let password = password.filter(|p| !p.is_empty()).map(str::to_string);
                let password_required = password.is_some() && pass_need != Some("false");
                slot.insert(Room {
                    id: room_id.to_string(),
                    password,
                    password_required,
                    created_at: now,
                    entered: false,
                });
                RoomHandle {
                    room_id: room_id.to_string(),
                    created: true,
                    password_required,
                }
            }
        }
    }

    pub fn check_room(&self, room_id: &str) -> RoomStatus {
        match self.rooms.get(room_id) {
            Some(room) => RoomStatus {
                exists: true,
                needs_password: room.password_required,
            },
            None => RoomStatus {
                exists: false,
                needs_password: false,
            },
        }
    }

    pub fn authenticate(&self, room_id: &str, supplied: Option<&str>) -> AuthOutcome {
        let Some(room) = self.rooms.get(room_id) else {
            return AuthOutcome::NotFound;
        };
        if !room.password_required {
            return AuthOutcome::Allowed;
        }

        match (supplied.filter(|p| !p.is_empty()), room.password.as_deref()) {
            (None, _) => AuthOutcome::NeedsPassword,
            (Some(given), Some(stored)) if given == stored => AuthOutcome::Allowed,
            (Some(_), _) => AuthOutcome::WrongPassword,
        }
    }

    /// Consume the room's creation marker. Returns `true` only for the
    /// first call after the room was created; unknown rooms return `false`.
    pub fn claim_first_entry(&mut self, room_id: &str) -> bool {
        match self.rooms.get_mut(room_id) {
            Some(room) if !room.entered => {
                room.entered = true;
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, room_id: &str) -> bool {
        self.rooms.contains_key(room_id)
    }
}
