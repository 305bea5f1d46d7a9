use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::session::{Connected, Disconnected};
use super::{
    HeartbeatEvent, InboundMessage, MqttConfig, MqttError, MqttSession, MqttTransport,
    SessionEvent,
};
use crate::host::HomePlatform;
use crate::sync::{Registry, SyncDescriptor, Topic, TOPIC_PING};

const MAX_ERROR_MESSAGES: usize = 10;

type Reply<T> = oneshot::Sender<Result<T, MqttError>>;

macro_rules! handle_action {
    ($action:expr, $response_tx:expr) => {
        reply($response_tx, $action.await)
    };
}

fn reply<T>(response_tx: Reply<T>, result: Result<T, MqttError>) {
    if response_tx.send(result).is_err() {
        error!("Failed to send response");
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Failed,
    Reconnecting,
}

#[derive(Clone, Debug, Default)]
pub struct MqttStatus {
    pub connection_state: ConnectionState,
    pub error_messages: Vec<String>,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub reconnects: usize,
    pub synced_topics: usize,
    pub last_activity: Option<chrono::DateTime<chrono::Local>>,
}

// Actions accepted by the sync worker
#[derive(Debug)]
pub enum ConnectionAction {
    Connect {
        response_tx: Reply<()>,
    },
    Disconnect {
        response_tx: Reply<()>,
    },
    CreateSync {
        sync: SyncDescriptor,
        response_tx: Reply<()>,
    },
    ModifySync {
        sync: SyncDescriptor,
        response_tx: Reply<bool>,
    },
    DestroySync {
        topic: Topic,
        response_tx: Reply<bool>,
    },
    Syncs {
        response_tx: Reply<Vec<SyncDescriptor>>,
    },
}

/// Why the connected loop ended.
enum Outcome {
    Reconnect,
    Disconnect(Reply<()>),
    Shutdown,
}

/// Why connecting was abandoned.
enum Abandon {
    Disconnect(Reply<()>),
    Shutdown,
}

/// Cloneable handle to the sync worker. The worker stops once every handle
/// has been dropped.
#[derive(Clone)]
pub struct ConnectionManager {
    tx: mpsc::Sender<ConnectionAction>,
    status: watch::Receiver<MqttStatus>,
}

impl ConnectionManager {
    pub fn spawn(
        config: MqttConfig,
        transport: Box<dyn MqttTransport>,
        host: Arc<dyn HomePlatform>,
    ) -> (Self, JoinHandle<()>) {
        let (tx, actions) = mpsc::channel(config.channel_capacity.max(1));
        let (status_tx, status) = watch::channel(MqttStatus::default());
        let session = MqttSession::create(transport, config.clone());
        let worker = SyncWorker {
            actions,
            registry: Registry::new(),
            host,
            config,
            status: status_tx,
        };
        let handle = tokio::spawn(worker.run(session));
        (Self { tx, status }, handle)
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> ConnectionAction,
    ) -> Result<T, MqttError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.tx
            .send(build(response_tx))
            .await
            .map_err(|_| MqttError::ChannelError("Sync worker has stopped".to_string()))?;
        response_rx
            .await
            .map_err(|e| MqttError::ChannelError(format!("No response from sync worker: {}", e)))?
    }

    /// Resolves once the first connection attempt has finished. On failure
    /// the worker keeps retrying in the background.
    pub async fn connect(&self) -> Result<(), MqttError> {
        self.request(|response_tx| ConnectionAction::Connect { response_tx })
            .await
    }

    /// A stopped worker counts as disconnected.
    pub async fn disconnect(&self) -> Result<(), MqttError> {
        match self
            .request(|response_tx| ConnectionAction::Disconnect { response_tx })
            .await
        {
            Err(MqttError::ChannelError(e)) => {
                debug!("Disconnect on stopped worker: {}", e);
                Ok(())
            }
            other => other,
        }
    }

    pub async fn create_sync(&self, sync: SyncDescriptor) -> Result<(), MqttError> {
        self.request(|response_tx| ConnectionAction::CreateSync { sync, response_tx })
            .await
    }

    /// `false` when the topic was not registered.
    pub async fn modify_sync(&self, sync: SyncDescriptor) -> Result<bool, MqttError> {
        self.request(|response_tx| ConnectionAction::ModifySync { sync, response_tx })
            .await
    }

    pub async fn destroy_sync(&self, topic: Topic) -> Result<bool, MqttError> {
        self.request(|response_tx| ConnectionAction::DestroySync { topic, response_tx })
            .await
    }

    pub async fn syncs(&self) -> Result<Vec<SyncDescriptor>, MqttError> {
        self.request(|response_tx| ConnectionAction::Syncs { response_tx })
            .await
    }

    pub fn status(&self) -> MqttStatus {
        self.status.borrow().clone()
    }
}

struct SyncWorker {
    actions: mpsc::Receiver<ConnectionAction>,
    registry: Registry,
    host: Arc<dyn HomePlatform>,
    config: MqttConfig,
    status: watch::Sender<MqttStatus>,
}

impl SyncWorker {
    async fn run(mut self, mut session: MqttSession<Disconnected>) {
        info!("Sync worker started");
        'idle: loop {
            let Some(response_tx) = self.wait_for_connect().await else {
                break;
            };
            let mut pending = Some(response_tx);

            loop {
                let connected = match self.connect(session, &mut pending).await {
                    Ok(connected) => connected,
                    Err((disconnected, abandon)) => {
                        session = disconnected;
                        self.set_state(ConnectionState::Disconnected);
                        match abandon {
                            Abandon::Disconnect(response_tx) => {
                                reply(response_tx, Ok(()));
                                continue 'idle;
                            }
                            Abandon::Shutdown => break 'idle,
                        }
                    }
                };

                let (disconnected, outcome) = self.serve(connected).await;
                session = disconnected;
                match outcome {
                    Outcome::Reconnect => {
                        self.status.send_modify(|status| {
                            status.connection_state = ConnectionState::Reconnecting;
                            status.reconnects += 1;
                        });
                        info!("Reconnecting to {}", self.config.host);
                    }
                    Outcome::Disconnect(response_tx) => {
                        self.set_state(ConnectionState::Disconnected);
                        reply(response_tx, Ok(()));
                        continue 'idle;
                    }
                    Outcome::Shutdown => break 'idle,
                }
            }
        }
        self.set_state(ConnectionState::Disconnected);
        info!("Sync worker stopped");
    }

    /// Serves registry actions while disconnected until a connect request
    /// arrives. `None` when every handle is gone.
    async fn wait_for_connect(&mut self) -> Option<Reply<()>> {
        while let Some(action) = self.actions.recv().await {
            match action {
                ConnectionAction::Connect { response_tx } => return Some(response_tx),
                ConnectionAction::Disconnect { response_tx } => {
                    debug!("Already disconnected");
                    reply(response_tx, Ok(()));
                }
                other => self.apply_offline(other),
            }
        }
        None
    }

    /// Attempts to connect until it works, waiting `reconnect_delay` between
    /// attempts. The first attempt's result goes to `pending`.
    async fn connect(
        &mut self,
        mut session: MqttSession<Disconnected>,
        pending: &mut Option<Reply<()>>,
    ) -> Result<MqttSession<Connected>, (MqttSession<Disconnected>, Abandon)> {
        loop {
            self.set_state(ConnectionState::Connecting);
            match session
                .begin()
                .establish(&self.registry, self.host.as_ref())
                .await
            {
                Ok(connected) => {
                    self.set_state(ConnectionState::Connected);
                    if let Some(response_tx) = pending.take() {
                        reply(response_tx, Ok(()));
                    }
                    return Ok(connected);
                }
                Err((disconnected, e)) => {
                    session = disconnected;
                    error!("Connecting to {} failed: {}", self.config.host, e);
                    self.record_error(&e);
                    self.set_state(ConnectionState::Failed);
                    if let Some(response_tx) = pending.take() {
                        reply(response_tx, Err(e));
                    }
                }
            }

            let delay = tokio::time::sleep(self.config.reconnect_delay());
            tokio::pin!(delay);
            loop {
                tokio::select! {
                    _ = &mut delay => break,
                    action = self.actions.recv() => match action {
                        None => return Err((session, Abandon::Shutdown)),
                        Some(ConnectionAction::Disconnect { response_tx }) => {
                            return Err((session, Abandon::Disconnect(response_tx)));
                        }
                        Some(ConnectionAction::Connect { response_tx }) => {
                            debug!("Connect requested while retrying, retrying now");
                            *pending = Some(response_tx);
                            break;
                        }
                        Some(other) => self.apply_offline(other),
                    },
                }
            }
        }
    }

    async fn serve(
        &mut self,
        mut session: MqttSession<Connected>,
    ) -> (MqttSession<Disconnected>, Outcome) {
        loop {
            let outcome = match session.next_event(&mut self.actions).await {
                SessionEvent::Action(None) => Some(Outcome::Shutdown),
                SessionEvent::Action(Some(action)) => self.handle_online(&mut session, action).await,
                SessionEvent::Inbound(msg) => {
                    self.route(&mut session, msg).await;
                    None
                }
                SessionEvent::LinkLost => {
                    warn!("Broker link lost");
                    Some(Outcome::Reconnect)
                }
                SessionEvent::StateChanged(change) => {
                    for sync in self.registry.watching(&change.entity_id) {
                        self.publish(&mut session, sync).await;
                    }
                    None
                }
                SessionEvent::Lagged(skipped) => {
                    warn!("Missed {} state changes, republishing everything", skipped);
                    for sync in self.registry.iter() {
                        self.publish(&mut session, sync).await;
                    }
                    None
                }
                SessionEvent::HeartbeatDue => self.heartbeat(&mut session).await,
            };

            if let Some(outcome) = outcome {
                let disconnected = session.close(&self.registry).await;
                return (disconnected, outcome);
            }
        }
    }

    async fn handle_online(
        &mut self,
        session: &mut MqttSession<Connected>,
        action: ConnectionAction,
    ) -> Option<Outcome> {
        match action {
            ConnectionAction::Connect { response_tx } => {
                debug!("Already connected");
                reply(response_tx, Ok(()));
            }
            ConnectionAction::Disconnect { response_tx } => {
                info!("Disconnect requested");
                return Some(Outcome::Disconnect(response_tx));
            }
            ConnectionAction::CreateSync { sync, response_tx } => {
                handle_action!(self.create_online(session, sync), response_tx);
            }
            ConnectionAction::ModifySync { sync, response_tx } => {
                handle_action!(self.modify_online(session, sync), response_tx);
            }
            ConnectionAction::DestroySync { topic, response_tx } => {
                handle_action!(self.destroy_online(session, &topic), response_tx);
            }
            ConnectionAction::Syncs { response_tx } => {
                reply(response_tx, Ok(self.registry.iter().cloned().collect()));
            }
        }
        None
    }

    /// Registry changes while there is no session. They take effect on the
    /// broker at the next connect.
    fn apply_offline(&mut self, action: ConnectionAction) {
        match action {
            ConnectionAction::CreateSync { sync, response_tx } => {
                debug!("Registering {} while offline", sync.topic());
                self.registry.create(sync);
                self.record_syncs();
                reply(response_tx, Ok(()));
            }
            ConnectionAction::ModifySync { sync, response_tx } => {
                let known = self.registry.modify(sync);
                reply(response_tx, Ok(known));
            }
            ConnectionAction::DestroySync { topic, response_tx } => {
                let removed = self.registry.destroy(topic.as_str()).is_some();
                self.record_syncs();
                reply(response_tx, Ok(removed));
            }
            ConnectionAction::Syncs { response_tx } => {
                reply(response_tx, Ok(self.registry.iter().cloned().collect()));
            }
            ConnectionAction::Connect { response_tx } | ConnectionAction::Disconnect { response_tx } => {
                reply(response_tx, Ok(()));
            }
        }
    }

    async fn create_online(
        &mut self,
        session: &mut MqttSession<Connected>,
        sync: SyncDescriptor,
    ) -> Result<(), MqttError> {
        let topic = sync.topic().clone();
        if self.registry.create(sync).is_some() {
            debug!("Replaced existing sync for {}", topic);
        }
        self.record_syncs();
        if let Some(sync) = self.registry.get(topic.as_str()) {
            self.publish(session, sync).await;
        }
        session.subscribe(&topic).await?;
        info!("Subscribed to {}", topic);
        Ok(())
    }

    async fn modify_online(
        &mut self,
        session: &mut MqttSession<Connected>,
        sync: SyncDescriptor,
    ) -> Result<bool, MqttError> {
        let topic = sync.topic().clone();
        if !self.registry.modify(sync) {
            debug!("Ignoring modify for unknown topic {}", topic);
            return Ok(false);
        }
        if let Some(sync) = self.registry.get(topic.as_str()) {
            self.publish(session, sync).await;
        }
        Ok(true)
    }

    async fn destroy_online(
        &mut self,
        session: &mut MqttSession<Connected>,
        topic: &Topic,
    ) -> Result<bool, MqttError> {
        if self.registry.destroy(topic.as_str()).is_none() {
            return Ok(false);
        }
        self.record_syncs();
        session.unsubscribe(topic).await?;
        info!("Unsubscribed from {}", topic);
        Ok(true)
    }

    async fn route(&self, session: &mut MqttSession<Connected>, msg: InboundMessage) {
        self.record_received();
        if msg.topic == TOPIC_PING {
            debug!("Heartbeat echo");
            session.echo();
            return;
        }
        let Some(sync) = self.registry.get(&msg.topic) else {
            debug!("Ignoring message for untracked topic: {}", msg);
            return;
        };
        if msg.payload.is_empty() {
            debug!("Ignoring empty message on {}", msg.topic);
            return;
        }
        if let Err(e) = sync.resolve_msg(&msg.payload, self.host.as_ref()).await {
            warn!("Acting on '{}' for {} failed: {}", msg.payload, sync.entity_id(), e);
        }
    }

    async fn publish(&self, session: &mut MqttSession<Connected>, sync: &SyncDescriptor) {
        match session.publish_sync(sync, self.host.as_ref()).await {
            Ok(true) => self.record_sent(),
            Ok(false) => {}
            Err(e) => {
                warn!("Publishing {} failed: {}", sync.topic(), e);
                self.record_error(&e);
            }
        }
    }

    async fn heartbeat(&self, session: &mut MqttSession<Connected>) -> Option<Outcome> {
        while let Some(event) = session.poll_heartbeat(Instant::now()) {
            match event {
                HeartbeatEvent::SendPing => match session.send_ping().await {
                    Ok(()) => debug!("Ping sent"),
                    Err(e) => warn!("Ping failed: {}", e),
                },
                HeartbeatEvent::Missed(count) => {
                    warn!("No ping echo ({} missed in a row)", count);
                }
                HeartbeatEvent::Reconnect => {
                    warn!("Broker silent for too long, forcing reconnect");
                    return Some(Outcome::Reconnect);
                }
            }
        }
        None
    }

    fn set_state(&self, state: ConnectionState) {
        self.status.send_modify(|status| status.connection_state = state);
    }

    fn record_error(&self, e: &MqttError) {
        let message = e.to_string();
        self.status.send_modify(|status| {
            status.error_messages.push(message);
            if status.error_messages.len() > MAX_ERROR_MESSAGES {
                status.error_messages.remove(0);
            }
        });
    }

    fn record_sent(&self) {
        self.status.send_modify(|status| {
            status.messages_sent += 1;
            status.last_activity = Some(chrono::Local::now());
        });
    }

    fn record_received(&self) {
        self.status.send_modify(|status| {
            status.messages_received += 1;
            status.last_activity = Some(chrono::Local::now());
        });
    }

    fn record_syncs(&self) {
        let count = self.registry.len();
        self.status.send_modify(|status| status.synced_topics = count);
    }
}
