//! Gateway error types.
//!
//! Every error here is scoped to a single connection's request; none of them
//! is fatal to the gateway.

use thiserror::Error;

use crate::dispatcher::ConnId;

/// Admission into a private room was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("room not found")]
    RoomNotFound,
    #[error("room requires a password")]
    NeedPassword,
    #[error("wrong room password")]
    WrongPassword,
}

impl AuthError {
    /// Message code sent to clients in `error { type: "auth" }`.
    pub fn wire_code(self) -> &'static str {
        match self {
            Self::RoomNotFound => "room_not_found",
            Self::NeedPassword => "need_password",
            Self::WrongPassword => "wrong_password",
        }
    }
}

/// A `join` could not register the requested display name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JoinError {
    #[error("display name {0:?} is already taken in this room")]
    NameTaken(String),
    #[error("connection was never admitted")]
    NotAdmitted,
    #[error("display name is empty")]
    EmptyName,
}

/// A chat message could not be routed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    /// Sender has no display name yet (client sent `message` before `join`).
    #[error("message from unnamed connection {0}")]
    StaleSender(ConnId),
    #[error("message has no content")]
    EmptyContent,
}
