use statum::{machine, state};
use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{Heartbeat, HeartbeatEvent, InboundMessage, MqttConfig, MqttError, MqttTransport};
use crate::host::{HomePlatform, StateChanged};
use crate::sync::{Registry, SyncDescriptor, Topic, PING_PAYLOAD, TOPIC_PING};

/// Broker session lifecycle
#[state]
#[derive(Debug, Clone)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// One broker session. Receivers and the heartbeat only exist while
/// connected; `close` drops them.
#[machine]
pub struct MqttSession<S: SessionState> {
    transport: Box<dyn MqttTransport>,
    config: MqttConfig,
    inbound: Option<mpsc::Receiver<InboundMessage>>,
    changes: Option<broadcast::Receiver<StateChanged>>,
    heartbeat: Option<Heartbeat>,
}

/// What woke the connected worker up.
#[derive(Debug)]
pub enum SessionEvent<A> {
    /// `None` once every handle is gone.
    Action(Option<A>),
    Inbound(InboundMessage),
    /// The transport's event loop stopped.
    LinkLost,
    StateChanged(StateChanged),
    /// State change notifications were dropped; everything must be re-sent.
    Lagged(u64),
    HeartbeatDue,
}

impl<S: SessionState> MqttSession<S> {
    pub fn config(&self) -> &MqttConfig {
        &self.config
    }

    async fn publish_state(
        &mut self,
        sync: &SyncDescriptor,
        host: &dyn HomePlatform,
    ) -> Result<bool, MqttError> {
        let Some(msg) = sync.generate_msg(host).await else {
            debug!("Nothing to publish for {}", sync.entity_id());
            return Ok(false);
        };
        let topic = sync.topic().publish_topic();
        self.transport.publish(&topic, &msg).await?;
        debug!("Published {} -> {}", topic, msg);
        Ok(true)
    }

    async fn teardown(&mut self) {
        self.heartbeat = None;
        self.changes = None;
        if let Err(e) = self.transport.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
        self.inbound = None;
    }
}

impl MqttSession<Disconnected> {
    pub fn create(transport: Box<dyn MqttTransport>, config: MqttConfig) -> Self {
        Self::new(
            transport, //
            config,
            None, // inbound
            None, // changes
            None, // heartbeat
        )
    }

    pub fn begin(self) -> MqttSession<Connecting> {
        debug!("Starting broker session");
        self.transition()
    }
}

impl MqttSession<Connecting> {
    /// Connects, then for every registered sync publishes its current state
    /// and subscribes to its topic, and finally subscribes to the ping topic.
    ///
    /// Host state changes are subscribed before anything is published so no
    /// change between the snapshot and the subscription is lost.
    pub async fn establish(
        mut self,
        registry: &Registry,
        host: &dyn HomePlatform,
    ) -> Result<MqttSession<Connected>, (MqttSession<Disconnected>, MqttError)> {
        match self.transport.connect().await {
            Ok(inbound) => self.inbound = Some(inbound),
            Err(e) => return Err((self.transition(), e)),
        }
        self.changes = Some(host.subscribe_state_changes());

        for sync in registry.iter() {
            if let Err(e) = self.publish_state(sync, host).await {
                return Err(self.abort(e).await);
            }
            if let Err(e) = self.transport.subscribe(sync.topic().as_str()).await {
                return Err(self.abort(e).await);
            }
        }
        if let Err(e) = self.transport.subscribe(TOPIC_PING).await {
            return Err(self.abort(e).await);
        }

        self.heartbeat = Some(Heartbeat::from_config(&self.config, Instant::now()));
        info!("Session established with {} syncs", registry.len());
        Ok(self.transition())
    }

    async fn abort(mut self, e: MqttError) -> (MqttSession<Disconnected>, MqttError) {
        warn!("Session setup failed: {}", e);
        self.teardown().await;
        (self.transition(), e)
    }
}

impl MqttSession<Connected> {
    /// Waits for the next thing the worker has to handle.
    pub async fn next_event<A>(&mut self, actions: &mut mpsc::Receiver<A>) -> SessionEvent<A> {
        loop {
            let deadline = self.heartbeat.as_ref().map(Heartbeat::next_deadline);
            let inbound = &mut self.inbound;
            let changes = &mut self.changes;

            tokio::select! {
                action = actions.recv() => return SessionEvent::Action(action),
                msg = recv_inbound(inbound) => return match msg {
                    Some(msg) => SessionEvent::Inbound(msg),
                    None => SessionEvent::LinkLost,
                },
                change = recv_change(changes) => match change {
                    Ok(change) => return SessionEvent::StateChanged(change),
                    Err(broadcast::error::RecvError::Lagged(n)) => return SessionEvent::Lagged(n),
                    Err(broadcast::error::RecvError::Closed) => {
                        warn!("Host state change stream closed");
                        self.changes = None;
                    }
                },
                _ = sleep_until(deadline) => return SessionEvent::HeartbeatDue,
            }
        }
    }

    pub async fn subscribe(&mut self, topic: &Topic) -> Result<(), MqttError> {
        self.transport.subscribe(topic.as_str()).await
    }

    pub async fn unsubscribe(&mut self, topic: &Topic) -> Result<(), MqttError> {
        self.transport.unsubscribe(topic.as_str()).await
    }

    /// Publishes the sync's current message to `<topic>/set`. Returns
    /// `false` when there was nothing to send.
    pub async fn publish_sync(
        &mut self,
        sync: &SyncDescriptor,
        host: &dyn HomePlatform,
    ) -> Result<bool, MqttError> {
        self.publish_state(sync, host).await
    }

    /// The ping goes straight to `hassping`, not `/set`, so it comes back.
    pub async fn send_ping(&mut self) -> Result<(), MqttError> {
        self.transport.publish(TOPIC_PING, PING_PAYLOAD).await
    }

    pub fn heartbeat(&self) -> Option<&Heartbeat> {
        self.heartbeat.as_ref()
    }

    pub fn echo(&mut self) {
        if let Some(heartbeat) = self.heartbeat.as_mut() {
            heartbeat.echo();
        }
    }

    pub fn poll_heartbeat(&mut self, now: Instant) -> Option<HeartbeatEvent> {
        self.heartbeat.as_mut().and_then(|heartbeat| heartbeat.poll(now))
    }

    /// Unsubscribes everything and drops the link. Failures are logged; the
    /// session ends up disconnected regardless.
    pub async fn close(mut self, registry: &Registry) -> MqttSession<Disconnected> {
        for topic in registry.topics() {
            if let Err(e) = self.transport.unsubscribe(topic.as_str()).await {
                debug!("Unsubscribe {} failed: {}", topic, e);
                break;
            }
        }
        if let Err(e) = self.transport.unsubscribe(TOPIC_PING).await {
            debug!("Unsubscribe {} failed: {}", TOPIC_PING, e);
        }
        self.teardown().await;
        info!("Session closed");
        self.transition()
    }
}

async fn recv_inbound(inbound: &mut Option<mpsc::Receiver<InboundMessage>>) -> Option<InboundMessage> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_change(
    changes: &mut Option<broadcast::Receiver<StateChanged>>,
) -> Result<StateChanged, broadcast::error::RecvError> {
    match changes {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
