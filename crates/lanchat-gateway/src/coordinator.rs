//! Coordinator
//!
//! Owns every piece of room and presence state and applies connection
//! events to it one at a time.
//!
//! ```text
//! Engine (event queue)
//!   └─ Coordinator ← THIS MODULE
//!       ├─ RoomRegistry        (private rooms + passwords)
//!       ├─ PresenceTable       (who holds which name where)
//!       ├─ ReconnectDebouncer  (grace timers, join dedup)
//!       ├─ HistoryStore        (bounded rings)
//!       └─ router              (audience + mentions)
//! ```
//!
//! Every handler leaves the tables consistent before returning, since the
//! next queued event (client command or fired timer) observes them as-is.

use lanchat_types::api::HandshakeParams;
use lanchat_types::events::{ClientCommand, ErrorKind, ServerEvent, VoiceCall};
use lanchat_types::models::{EntryKind, HistoryEntry, PresenceAction, UserEntry};
use tracing::{debug, info, trace, warn};

use crate::config::GatewayConfig;
use crate::debounce::ReconnectDebouncer;
use crate::dispatcher::{ConnId, Transport};
use crate::env::{Environment, TimerKey};
use crate::error::{AuthError, JoinError, RouteError};
use crate::history::HistoryStore;
use crate::namespace::Namespace;
use crate::presence::PresenceTable;
use crate::rooms::{RoomRegistry, RoomStatus};
use crate::router;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VoiceSignal {
    Join,
    Leave,
    End,
    Mute,
    Audio,
}

impl VoiceSignal {
    fn into_event(self, call: VoiceCall) -> ServerEvent {
        match self {
            Self::Join => ServerEvent::VoiceCallJoin(call),
            Self::Leave => ServerEvent::VoiceCallLeave(call),
            Self::End => ServerEvent::VoiceCallEnd(call),
            Self::Mute => ServerEvent::VoiceCallMute(call),
            Self::Audio => ServerEvent::VoiceCallAudio(call),
        }
    }
}

pub struct Coordinator<E, T> {
    config: GatewayConfig,
    env: E,
    transport: T,
    rooms: RoomRegistry,
    presence: PresenceTable,
    debouncer: ReconnectDebouncer,
    history: HistoryStore,
}

impl<E: Environment, T: Transport> Coordinator<E, T> {
    pub fn new(config: GatewayConfig, env: E, transport: T) -> Self {
        let history = HistoryStore::new(config.history_capacity);
        Self {
            config,
            env,
            transport,
            rooms: RoomRegistry::new(),
            presence: PresenceTable::new(),
            debouncer: ReconnectDebouncer::new(),
            history,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn presence(&self) -> &PresenceTable {
        &self.presence
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    // ── Connection lifecycle ────────────────────────────────────────────

    /// Admit a freshly accepted connection, already registered with the
    /// transport.
    ///
    /// On an auth failure the connection gets an `error` event and stays
    /// open, but is not admitted: its later commands are ignored.
    pub fn on_connect(&mut self, conn: ConnId, params: &HandshakeParams) -> Result<Namespace, AuthError> {
        let namespace = Namespace::from_chat_id(params.chat_id.as_deref());
        let now = self.env.now_millis();

        self.sweep_stale_public();
        self.debouncer.prune_announcements(now);

        match &namespace {
            Namespace::Public => {
                self.transport.join_room(conn, namespace.transport_room());
                self.presence.admit(conn, Namespace::Public);

                let retention = Some(self.config.history_retention);
                let history = self.history.snapshot(&Namespace::Public, now, retention);
                self.transport.emit(conn, ServerEvent::History(history));
            }
            Namespace::Private(room_id) => {
                if let Err(err) = self.authorize_private(room_id, params, now) {
                    warn!("{} refused entry to room {}: {}", conn, room_id, err);
                    self.transport.emit(
                        conn,
                        ServerEvent::Error {
                            kind: ErrorKind::Auth,
                            message: err.wire_code().to_string(),
                        },
                    );
                    return Err(err);
                }
                self.transport.join_room(conn, room_id);
                self.presence.admit(conn, namespace.clone());
            }
        }

        info!("{} admitted to {}", conn, namespace);
        self.transport.emit(
            conn,
            ServerEvent::ConnectionConfirmed {
                room: namespace.transport_room().to_string(),
                is_private: namespace.is_private(),
            },
        );
        Ok(namespace)
    }

    /// The room's first entry may use `creating=1` to skip the password
    /// check, creating the room if no `createRoom` preceded it. Any admission
    /// uses up that first entry.
    fn authorize_private(&mut self, room_id: &str, params: &HandshakeParams, now: i64) -> Result<(), AuthError> {
        if params.is_creating() {
            if !self.rooms.contains(room_id) {
                let handle = self
                    .rooms
                    .create_room(room_id, params.pass.as_deref(), params.pass_need.as_deref(), now);
                info!("room {} created on first entry (password: {})", room_id, handle.password_required);
            }
            if self.rooms.claim_first_entry(room_id) {
                return Ok(());
            }
        }

        self.rooms.authenticate(room_id, params.pass.as_deref()).into_result()?;
        self.rooms.claim_first_entry(room_id);
        Ok(())
    }

    pub fn on_disconnect(&mut self, conn: ConnId) {
        let namespace = self.presence.namespace_of(conn).cloned();
        self.transport.unregister(conn);

        match namespace {
            None => debug!("{} disconnected before admission", conn),

            Some(Namespace::Public) => match self.presence.mark_pending(conn) {
                Some(user) => {
                    let grace = self.config.reconnect_grace;
                    self.debouncer.schedule_removal(&mut self.env, &user.name, conn, grace);
                    debug!("{} ({}) disconnected, holding name for {:?}", user.name, conn, grace);
                }
                None => {
                    self.presence.remove(conn);
                }
            },

            Some(namespace @ Namespace::Private(_)) => {
                if let Some(user) = self.presence.remove(conn) {
                    info!("{} ({}) left {}", user.name, conn, namespace);
                    self.broadcast_user_list(&namespace);
                    self.announce(&namespace, &user.name, PresenceAction::Leave);
                }
            }
        }
    }

    /// A scheduled timer fired. Re-validates before acting: the timer may
    /// have been cancelled or superseded after it was queued.
    pub fn on_timer(&mut self, key: TimerKey) {
        match key {
            TimerKey::PendingRemoval { name, generation } => {
                let Some(conn) = self.debouncer.take_fired(&name, generation) else {
                    debug!("grace timer for {} no longer pending", name);
                    return;
                };
                if self.presence.remove(conn).is_none() {
                    return;
                }

                info!("{} left {} (grace period expired)", name, Namespace::Public);
                self.broadcast_user_list(&Namespace::Public);
                if !self.presence.has_live_name(&Namespace::Public, &name) {
                    self.announce(&Namespace::Public, &name, PresenceAction::Leave);
                }
            }
        }
    }

    /// Drop public entries whose socket vanished without a disconnect event.
    fn sweep_stale_public(&mut self) {
        for conn in self.presence.connections(&Namespace::Public) {
            if self.transport.is_connected(conn) || self.presence.is_pending(conn) {
                continue;
            }
            if let Some(user) = self.presence.remove(conn) {
                warn!("dropping stale public entry {} ({})", user.name, conn);
                if !self.presence.has_live_name(&Namespace::Public, &user.name) {
                    self.announce(&Namespace::Public, &user.name, PresenceAction::Leave);
                }
            }
        }
    }

    // ── Client commands ─────────────────────────────────────────────────

    pub fn on_command(&mut self, conn: ConnId, command: ClientCommand) {
        let Some(namespace) = self.presence.namespace_of(conn).cloned() else {
            debug!("ignoring command from unadmitted connection {}", conn);
            return;
        };

        match command {
            ClientCommand::RequestUserList => {
                let users = self.user_entries(&namespace);
                match &namespace {
                    Namespace::Public => self.transport.emit(conn, ServerEvent::UserList(users)),
                    Namespace::Private(_) => self.broadcast(&namespace, ServerEvent::UserList(users)),
                }
            }

            ClientCommand::RequestHistory => {
                let now = self.env.now_millis();
                let history = self.history.snapshot(&namespace, now, None);
                self.transport.emit(conn, ServerEvent::ChatHistory(history));
            }

            ClientCommand::Join(name) => self.join(conn, &namespace, &name),

            ClientCommand::Message { kind, content } => self.message(conn, kind, content),

            ClientCommand::CreateRoom {
                room_id,
                password,
                pass_need_id,
            } => self.create_room(conn, &room_id, password.as_deref(), pass_need_id.as_deref()),

            ClientCommand::VoiceCallJoin(call) => self.relay_voice(conn, &namespace, VoiceSignal::Join, call),
            ClientCommand::VoiceCallLeave(call) => self.relay_voice(conn, &namespace, VoiceSignal::Leave, call),
            ClientCommand::VoiceCallEnd(call) => self.relay_voice(conn, &namespace, VoiceSignal::End, call),
            ClientCommand::VoiceCallMute(call) => self.relay_voice(conn, &namespace, VoiceSignal::Mute, call),
            ClientCommand::VoiceCallAudio(call) => self.relay_voice(conn, &namespace, VoiceSignal::Audio, call),
        }
    }

    fn join(&mut self, conn: ConnId, namespace: &Namespace, name: &str) {
        let name = name.trim();

        // A public name still inside its grace period is reclaimed by the
        // reconnecting client; nobody saw it leave, so nobody sees it join.
        // Only a connection without a name can reclaim one.
        let mut reconnected = false;
        let unnamed = self.presence.user(conn).is_none();
        if !namespace.is_private() && unnamed {
            if let Some(stale) = self.debouncer.cancel_pending_removal(name) {
                self.presence.remove(stale);
                reconnected = true;
            }
        }

        let joined = match self.presence.join(conn, name) {
            Ok(joined) => joined,
            Err(JoinError::NameTaken(taken)) => {
                info!("{} refused name {:?} in {}", conn, taken, namespace);
                self.transport.emit(
                    conn,
                    ServerEvent::Error {
                        kind: ErrorKind::Name,
                        message: "name_taken".to_string(),
                    },
                );
                return;
            }
            Err(err) => {
                debug!("{} join ignored: {}", conn, err);
                return;
            }
        };

        if joined.already_joined {
            debug!("{} already joined as {}", conn, joined.name);
            return;
        }
        if joined.renamed {
            info!("{} asked for {:?}, assigned {:?}", conn, name, joined.name);
            self.transport.emit(conn, ServerEvent::NameChanged(joined.name.clone()));
        }

        self.broadcast_user_list(namespace);

        if reconnected {
            info!("{} ({}) reconnected to {}", joined.name, conn, namespace);
            return;
        }
        info!("{} ({}) joined {}", joined.name, conn, namespace);

        let now = self.env.now_millis();
        let window = self.config.join_debounce;
        if !self
            .debouncer
            .suppress_duplicate_join_announcement(namespace, &joined.name, now, window)
        {
            self.announce(namespace, &joined.name, PresenceAction::Join);
        }
    }

    fn message(&mut self, conn: ConnId, kind: EntryKind, content: String) {
        let now = self.env.now_millis();
        match router::route(
            &self.presence,
            &mut self.history,
            &self.transport,
            conn,
            kind,
            content,
            now,
        ) {
            Ok(routed) => router::deliver(&self.transport, &routed),
            Err(RouteError::StaleSender(sender)) => {
                debug!("dropping message from unnamed connection {}", sender);
            }
            Err(err) => debug!("dropping message from {}: {}", conn, err),
        }
    }

    fn create_room(&mut self, conn: ConnId, room_id: &str, password: Option<&str>, pass_need: Option<&str>) {
        let room_id = room_id.trim();
        if room_id.is_empty() || Namespace::from_chat_id(Some(room_id)) == Namespace::Public {
            warn!("{} tried to create reserved room id {:?}", conn, room_id);
            self.transport.emit(
                conn,
                ServerEvent::RoomCreated {
                    room_id: room_id.to_string(),
                    created: false,
                },
            );
            return;
        }

        let now = self.env.now_millis();
        let handle = self.rooms.create_room(room_id, password, pass_need, now);
        if handle.created {
            info!("room {} created by {} (password: {})", room_id, conn, handle.password_required);
        } else {
            debug!("room {} already exists, left untouched", room_id);
        }
        self.transport.emit(
            conn,
            ServerEvent::RoomCreated {
                room_id: handle.room_id,
                created: handle.created,
            },
        );
    }

    /// Stateless fan-out of voice-call signaling within the namespace.
    /// Everyone but the sender hears it, except `End`, which the sender
    /// receives too.
    fn relay_voice(&mut self, conn: ConnId, namespace: &Namespace, signal: VoiceSignal, mut call: VoiceCall) {
        if signal == VoiceSignal::Audio {
            trace!("{} relaying voice audio for call {}", conn, call.call_id);
        } else {
            call.timestamp = Some(self.env.now_millis());
            debug!("{} voice {:?} for call {} in {}", conn, signal, call.call_id, namespace);
        }

        let event = signal.into_event(call);
        for target in router::audience_connections(&self.transport, &self.presence, namespace) {
            if target != conn || signal == VoiceSignal::End {
                self.transport.emit(target, event.clone());
            }
        }
    }

    // ── Queries & maintenance ───────────────────────────────────────────

    pub fn check_room(&self, room_id: &str) -> RoomStatus {
        self.rooms.check_room(room_id)
    }

    /// Prune public history past the retention window.
    pub fn sweep(&mut self) {
        let now = self.env.now_millis();
        let pruned = self
            .history
            .ring_mut(&Namespace::Public)
            .prune(now, self.config.history_retention);
        if pruned > 0 {
            info!("pruned {} expired public history entries", pruned);
        }
        self.debouncer.prune_announcements(now);
    }

    // ── Broadcast helpers ───────────────────────────────────────────────

    fn user_entries(&self, namespace: &Namespace) -> Vec<UserEntry> {
        self.presence
            .list_audience(namespace)
            .iter()
            .map(|user| user.to_entry())
            .collect()
    }

    fn broadcast(&self, namespace: &Namespace, event: ServerEvent) {
        for conn in router::audience_connections(&self.transport, &self.presence, namespace) {
            self.transport.emit(conn, event.clone());
        }
    }

    fn broadcast_user_list(&self, namespace: &Namespace) {
        let users = self.user_entries(namespace);
        self.broadcast(namespace, ServerEvent::UserList(users));
    }

    fn announce(&self, namespace: &Namespace, name: &str, action: PresenceAction) {
        let entry = HistoryEntry::announcement(name, action, namespace.is_private(), self.env.now_millis());
        self.broadcast(namespace, ServerEvent::Message(entry));
    }
}
