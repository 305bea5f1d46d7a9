use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{InboundMessage, MqttConfig, MqttError};

const DISCONNECT_GRACE: Duration = Duration::from_secs(1);

/// The broker operations the session needs. Subscriptions are QoS 2.
#[async_trait]
pub trait MqttTransport: Send {
    /// Opens a fresh session. Publishes arrive on the returned channel, which
    /// closes when the link drops.
    async fn connect(&mut self) -> Result<mpsc::Receiver<InboundMessage>, MqttError>;

    async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError>;

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), MqttError>;

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), MqttError>;

    /// Safe to call when not connected.
    async fn disconnect(&mut self) -> Result<(), MqttError>;
}

/// rumqttc-backed transport. The client id is the bemfa uid.
pub struct RumqttcTransport {
    client_id: String,
    config: MqttConfig,
    client: Option<AsyncClient>,
    cancel: Option<CancellationToken>,
    poll_task: Option<JoinHandle<()>>,
}

impl RumqttcTransport {
    pub fn new(client_id: &str, config: MqttConfig) -> Self {
        Self {
            client_id: client_id.to_string(),
            config,
            client: None,
            cancel: None,
            poll_task: None,
        }
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.config.host, self.config.port);
        options
            .set_keep_alive(self.config.keepalive())
            .set_clean_session(true);
        options
    }

    fn client(&self) -> Result<&AsyncClient, MqttError> {
        self.client.as_ref().ok_or(MqttError::NotConnected)
    }

    async fn wait_for_connack(eventloop: &mut EventLoop) -> Result<(), MqttError> {
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    return if ack.code == ConnectReturnCode::Success {
                        Ok(())
                    } else {
                        Err(MqttError::ConnectionError(format!(
                            "Broker refused connection: {:?}",
                            ack.code
                        )))
                    };
                }
                Ok(_) => continue,
                Err(e) => return Err(MqttError::ConnectionError(e.to_string())),
            }
        }
    }

    async fn forward(
        mut eventloop: EventLoop,
        inbound: mpsc::Sender<InboundMessage>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("MQTT event loop cancelled");
                    break;
                }
                event = eventloop.poll() => match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let msg = InboundMessage::from_bytes(publish.topic, &publish.payload);
                        if !deliver(&inbound, msg) {
                            debug!("Inbound receiver dropped, stopping event loop");
                            break;
                        }
                    }
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                        debug!("Disconnect sent, stopping event loop");
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!("MQTT event loop error: {}", e);
                        break;
                    }
                }
            }
        }
    }
}

/// Hands a publish to the worker without waiting; the event loop has to keep
/// polling while the worker issues requests. A full inbound channel drops
/// the message. Returns `false` once the receiver is gone.
fn deliver(inbound: &mpsc::Sender<InboundMessage>, msg: InboundMessage) -> bool {
    match inbound.try_send(msg) {
        Ok(()) => true,
        Err(TrySendError::Full(msg)) => {
            warn!("Inbound queue full, dropping message on {}", msg.topic);
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

#[async_trait]
impl MqttTransport for RumqttcTransport {
    async fn connect(&mut self) -> Result<mpsc::Receiver<InboundMessage>, MqttError> {
        self.disconnect().await?;

        info!(
            "Connecting to {}:{} as {}",
            self.config.host, self.config.port, self.client_id
        );
        let (client, mut eventloop) = AsyncClient::new(self.options(), self.config.channel_capacity);

        let timeout = self.config.connect_timeout();
        tokio::time::timeout(timeout, Self::wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| MqttError::Timeout(timeout))??;

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let cancel = CancellationToken::new();
        self.poll_task = Some(tokio::spawn(Self::forward(eventloop, tx, cancel.clone())));
        self.cancel = Some(cancel);
        self.client = Some(client);
        info!("Connected to {}", self.config.host);
        Ok(rx)
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.client()?.subscribe(topic, QoS::ExactlyOnce).await?;
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        self.client()?.unsubscribe(topic).await?;
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), MqttError> {
        self.client()?
            .publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MqttError> {
        if let Some(client) = self.client.take() {
            if let Err(e) = client.disconnect().await {
                debug!("Disconnect request not delivered: {}", e);
            }
        }
        if let Some(mut task) = self.poll_task.take() {
            if tokio::time::timeout(DISCONNECT_GRACE, &mut task).await.is_err() {
                debug!("Event loop did not stop in time, cancelling");
                if let Some(cancel) = &self.cancel {
                    cancel.cancel();
                }
                task.abort();
            }
        }
        self.cancel = None;
        Ok(())
    }
}
