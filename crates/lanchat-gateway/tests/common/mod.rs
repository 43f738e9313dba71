#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use lanchat_gateway::config::GatewayConfig;
use lanchat_gateway::coordinator::Coordinator;
use lanchat_gateway::dispatcher::{ConnId, Transport};
use lanchat_gateway::env::{Environment, TimerHandle, TimerKey};
use lanchat_gateway::error::AuthError;
use lanchat_gateway::namespace::Namespace;
use lanchat_types::api::HandshakeParams;
use lanchat_types::events::{ClientCommand, ServerEvent};
use lanchat_types::models::{EntryKind, HistoryEntry, UserEntry};

pub const START: i64 = 1_700_000_000_000;

struct ManualTimer {
    key: TimerKey,
    due: i64,
    cancelled: Arc<AtomicBool>,
}

/// Clock that only moves when told to; timers are recorded, never spawned.
pub struct ManualEnvironment {
    now: i64,
    timers: Vec<ManualTimer>,
}

impl ManualEnvironment {
    pub fn new(now: i64) -> Self {
        Self {
            now,
            timers: Vec::new(),
        }
    }

    /// Move the clock forward and return the timers that came due, in order.
    pub fn advance(&mut self, by: Duration) -> Vec<TimerKey> {
        self.now += by.as_millis() as i64;
        let now = self.now;

        let (mut due, pending): (Vec<_>, Vec<_>) = self.timers.drain(..).partition(|timer| timer.due <= now);
        self.timers = pending;
        due.sort_by_key(|timer| timer.due);
        due.into_iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .map(|timer| timer.key)
            .collect()
    }

    pub fn armed(&self) -> Vec<TimerKey> {
        self.timers
            .iter()
            .filter(|timer| !timer.cancelled.load(Ordering::SeqCst))
            .map(|timer| timer.key.clone())
            .collect()
    }
}

impl Environment for ManualEnvironment {
    fn now_millis(&self) -> i64 {
        self.now
    }

    fn schedule(&mut self, key: TimerKey, delay: Duration) -> TimerHandle {
        let cancelled = Arc::new(AtomicBool::new(false));
        self.timers.push(ManualTimer {
            key,
            due: self.now + delay.as_millis() as i64,
            cancelled: cancelled.clone(),
        });
        TimerHandle::new(move || cancelled.store(true, Ordering::SeqCst))
    }
}

/// In-memory transport that records every emitted event.
#[derive(Default)]
pub struct RecordingTransport {
    connected: HashSet<ConnId>,
    rooms: HashMap<String, Vec<ConnId>>,
    sent: RefCell<Vec<(ConnId, ServerEvent)>>,
}

impl RecordingTransport {
    pub fn register(&mut self, conn: ConnId) {
        self.connected.insert(conn);
    }
}

impl Transport for RecordingTransport {
    fn emit(&self, conn: ConnId, event: ServerEvent) {
        if self.connected.contains(&conn) {
            self.sent.borrow_mut().push((conn, event));
        }
    }

    fn join_room(&mut self, conn: ConnId, room: &str) {
        let members = self.rooms.entry(room.to_string()).or_default();
        if !members.contains(&conn) {
            members.push(conn);
        }
    }

    fn unregister(&mut self, conn: ConnId) {
        self.connected.remove(&conn);
        self.rooms.retain(|_, members| {
            members.retain(|member| *member != conn);
            !members.is_empty()
        });
    }

    fn room_members(&self, room: &str) -> Vec<ConnId> {
        self.rooms.get(room).cloned().unwrap_or_default()
    }

    fn is_connected(&self, conn: ConnId) -> bool {
        self.connected.contains(&conn)
    }
}

pub type TestCoordinator = Coordinator<ManualEnvironment, RecordingTransport>;

pub struct Harness {
    pub coord: TestCoordinator,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(GatewayConfig::default())
    }

    pub fn with_config(config: GatewayConfig) -> Self {
        Self {
            coord: Coordinator::new(config, ManualEnvironment::new(START), RecordingTransport::default()),
        }
    }

    pub fn connect_with(&mut self, params: HandshakeParams) -> (ConnId, Result<Namespace, AuthError>) {
        let conn = ConnId::new();
        self.coord.transport_mut().register(conn);
        let admitted = self.coord.on_connect(conn, &params);
        (conn, admitted)
    }

    pub fn connect_public(&mut self) -> ConnId {
        let (conn, admitted) = self.connect_with(HandshakeParams::default());
        assert_eq!(admitted, Ok(Namespace::Public));
        conn
    }

    pub fn connect_private(&mut self, room: &str, pass: Option<&str>) -> ConnId {
        let (conn, admitted) = self.connect_with(private_params(room, pass));
        assert_eq!(admitted, Ok(Namespace::Private(room.to_string())));
        conn
    }

    /// Connect to the public lobby and claim `name`.
    pub fn public_user(&mut self, name: &str) -> ConnId {
        let conn = self.connect_public();
        self.join(conn, name);
        conn
    }

    pub fn join(&mut self, conn: ConnId, name: &str) {
        self.coord.on_command(conn, ClientCommand::Join(name.to_string()));
    }

    pub fn say(&mut self, conn: ConnId, content: &str) {
        self.coord.on_command(
            conn,
            ClientCommand::Message {
                kind: EntryKind::User,
                content: content.to_string(),
            },
        );
    }

    pub fn create_room(&mut self, conn: ConnId, room: &str, password: Option<&str>) {
        self.coord.on_command(
            conn,
            ClientCommand::CreateRoom {
                room_id: room.to_string(),
                password: password.map(str::to_string),
                pass_need_id: None,
            },
        );
    }

    pub fn disconnect(&mut self, conn: ConnId) {
        self.coord.on_disconnect(conn);
    }

    /// Advance the clock, delivering every timer that comes due.
    pub fn advance(&mut self, by: Duration) {
        let fired = self.coord.env_mut().advance(by);
        for key in fired {
            self.coord.on_timer(key);
        }
    }

    /// Drain everything sent to `conn` so far.
    pub fn take(&mut self, conn: ConnId) -> Vec<ServerEvent> {
        let mut sent = self.coord.transport().sent.borrow_mut();
        let (mine, rest): (Vec<_>, Vec<_>) = sent.drain(..).partition(|(to, _)| *to == conn);
        *sent = rest;
        mine.into_iter().map(|(_, event)| event).collect()
    }

    pub fn clear(&mut self) {
        self.coord.transport().sent.borrow_mut().clear();
    }
}

pub fn private_params(room: &str, pass: Option<&str>) -> HandshakeParams {
    HandshakeParams {
        chat_id: Some(room.to_string()),
        private: Some("1".to_string()),
        pass: pass.map(str::to_string),
        ..HandshakeParams::default()
    }
}

pub fn messages(events: &[ServerEvent]) -> Vec<HistoryEntry> {
    events
        .iter()
        .filter_map(|event| match event {
            ServerEvent::Message(entry) => Some(entry.clone()),
            _ => None,
        })
        .collect()
}

pub fn contents(events: &[ServerEvent]) -> Vec<String> {
    messages(events).into_iter().map(|entry| entry.content).collect()
}

/// Names in the most recent `userList` among `events`.
pub fn last_user_list(events: &[ServerEvent]) -> Option<Vec<String>> {
    events.iter().rev().find_map(|event| match event {
        ServerEvent::UserList(users) => Some(names(users)),
        _ => None,
    })
}

pub fn names(users: &[UserEntry]) -> Vec<String> {
    users.iter().map(|user| user.user.clone()).collect()
}
