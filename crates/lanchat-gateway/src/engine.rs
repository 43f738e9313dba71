//! The engine task: the only code that touches coordination state.
//!
//! Connections, timers and HTTP handlers all talk to it through one
//! unbounded queue, and it applies each input to the [`Coordinator`] to
//! completion before taking the next.

use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use lanchat_types::api::HandshakeParams;
use lanchat_types::events::{ClientCommand, ServerEvent};

use crate::config::GatewayConfig;
use crate::coordinator::Coordinator;
use crate::dispatcher::{ConnId, Dispatcher};
use crate::env::{Environment, TimerHandle, TimerKey};
use crate::rooms::RoomStatus;

/// Everything the engine reacts to.
#[derive(Debug)]
pub enum Input {
    Connect {
        conn: ConnId,
        params: HandshakeParams,
        tx: mpsc::UnboundedSender<ServerEvent>,
    },
    Command {
        conn: ConnId,
        command: ClientCommand,
    },
    Disconnect {
        conn: ConnId,
    },
    TimerFired(TimerKey),
    CheckRoom {
        room_id: String,
        reply: oneshot::Sender<RoomStatus>,
    },
    Sweep,
}

/// Real clock; timers are tokio sleeps that post back into the engine queue.
///
/// Holds a weak sender so pending timers never keep the engine alive.
pub struct TokioEnvironment {
    tx: mpsc::WeakUnboundedSender<Input>,
}

impl Environment for TokioEnvironment {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }

    fn schedule(&mut self, key: TimerKey, delay: Duration) -> TimerHandle {
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(tx) = tx.upgrade() {
                let _ = tx.send(Input::TimerFired(key));
            }
        });
        let abort = task.abort_handle();
        TimerHandle::new(move || abort.abort())
    }
}

/// Cheap, cloneable handle to the engine task.
#[derive(Clone)]
pub struct Engine {
    tx: mpsc::UnboundedSender<Input>,
}

impl Engine {
    /// Spawn the engine task (and its sweep ticker) on the current runtime.
    pub fn spawn(config: GatewayConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let env = TokioEnvironment { tx: tx.downgrade() };

        if !config.sweep_interval.is_zero() {
            tokio::spawn(run_sweep_ticker(tx.downgrade(), config.sweep_interval));
        }

        let coordinator = Coordinator::new(config, env, Dispatcher::new());
        tokio::spawn(run(coordinator, rx));

        Self { tx }
    }

    pub fn connect(&self, conn: ConnId, params: HandshakeParams, tx: mpsc::UnboundedSender<ServerEvent>) {
        self.send(Input::Connect { conn, params, tx });
    }

    pub fn command(&self, conn: ConnId, command: ClientCommand) {
        self.send(Input::Command { conn, command });
    }

    pub fn disconnect(&self, conn: ConnId) {
        self.send(Input::Disconnect { conn });
    }

    /// Room-existence query. `None` if the engine has stopped.
    pub async fn check_room(&self, room_id: String) -> Option<RoomStatus> {
        let (reply, rx) = oneshot::channel();
        self.send(Input::CheckRoom { room_id, reply });
        rx.await.ok()
    }

    fn send(&self, input: Input) {
        if self.tx.send(input).is_err() {
            debug!("engine stopped, dropping input");
        }
    }
}

async fn run(mut coordinator: Coordinator<TokioEnvironment, Dispatcher>, mut rx: mpsc::UnboundedReceiver<Input>) {
    info!("engine started");
    while let Some(input) = rx.recv().await {
        apply(&mut coordinator, input);
    }
    info!("engine stopped");
}

fn apply(coordinator: &mut Coordinator<TokioEnvironment, Dispatcher>, input: Input) {
    match input {
        Input::Connect { conn, params, tx } => {
            coordinator.transport_mut().register(conn, tx);
            // an auth failure is reported to the client and logged inside
            let _ = coordinator.on_connect(conn, &params);
        }
        Input::Command { conn, command } => coordinator.on_command(conn, command),
        Input::Disconnect { conn } => coordinator.on_disconnect(conn),
        Input::TimerFired(key) => coordinator.on_timer(key),
        Input::CheckRoom { room_id, reply } => {
            let _ = reply.send(coordinator.check_room(&room_id));
        }
        Input::Sweep => coordinator.sweep(),
    }
}

async fn run_sweep_ticker(tx: mpsc::WeakUnboundedSender<Input>, every: Duration) {
    let mut interval = tokio::time::interval(every);
    interval.tick().await;

    loop {
        interval.tick().await;
        let Some(tx) = tx.upgrade() else { break };
        if tx.send(Input::Sweep).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use lanchat_types::models::EntryKind;

    use super::*;

    async fn recv(rx: &mut mpsc::UnboundedReceiver<ServerEvent>) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("channel closed")
    }

    #[tokio::test]
    async fn connect_join_and_message_round_trip() {
        let engine = Engine::spawn(GatewayConfig::default());
        let conn = ConnId::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        engine.connect(conn, HandshakeParams::default(), tx);
        assert!(matches!(recv(&mut rx).await, ServerEvent::History(h) if h.is_empty()));
        assert!(matches!(
            recv(&mut rx).await,
            ServerEvent::ConnectionConfirmed { is_private: false, .. }
        ));

        engine.command(conn, ClientCommand::Join("Alice".into()));
        assert!(matches!(recv(&mut rx).await, ServerEvent::UserList(users) if users.len() == 1));
        assert!(matches!(recv(&mut rx).await, ServerEvent::Message(entry) if entry.kind == EntryKind::System));

        engine.command(
            conn,
            ClientCommand::Message {
                kind: EntryKind::User,
                content: "hello".into(),
            },
        );
        match recv(&mut rx).await {
            ServerEvent::Message(entry) => {
                assert_eq!(entry.author.as_deref(), Some("Alice"));
                assert_eq!(entry.content, "hello");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn check_room_answers_through_the_queue() {
        let engine = Engine::spawn(GatewayConfig::default());
        let conn = ConnId::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        engine.connect(conn, HandshakeParams::default(), tx);
        engine.command(
            conn,
            ClientCommand::CreateRoom {
                room_id: "r1".into(),
                password: Some("pw".into()),
                pass_need_id: None,
            },
        );

        let status = engine.check_room("r1".into()).await;
        assert_eq!(status, Some(RoomStatus { exists: true, needs_password: true }));
        let missing = engine.check_room("nope".into()).await;
        assert_eq!(missing, Some(RoomStatus { exists: false, needs_password: false }));
    }

    #[tokio::test(start_paused = true)]
    async fn grace_timer_fires_through_the_queue() {
        let config = GatewayConfig {
            reconnect_grace: Duration::from_millis(500),
            ..GatewayConfig::default()
        };
        let engine = Engine::spawn(config);

        let (alice, bob) = (ConnId::new(), ConnId::new());
        let (alice_tx, _alice_rx) = mpsc::unbounded_channel();
        let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
        engine.connect(alice, HandshakeParams::default(), alice_tx);
        engine.connect(bob, HandshakeParams::default(), bob_tx);
        engine.command(alice, ClientCommand::Join("Alice".into()));
        engine.command(bob, ClientCommand::Join("Bob".into()));
        engine.disconnect(alice);

        tokio::time::sleep(Duration::from_millis(600)).await;

        let mut left = false;
        while let Ok(event) = bob_rx.try_recv() {
            if let ServerEvent::Message(entry) = event {
                left |= entry.content == "Alice left the chat";
            }
        }
        assert!(left);
    }
}
