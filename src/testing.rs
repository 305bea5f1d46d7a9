//! In-memory stand-ins for the broker, the host, the directory and the
//! config store. Each records what was asked of it.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use color_eyre::Result;
use tokio::sync::{broadcast, mpsc, watch};

use crate::codec::Command;
use crate::directory::{DirectoryError, TopicDirectory};
use crate::entity::{domain_of, EntityState};
use crate::host::{Area, HomePlatform, HostError, StateChanged};
use crate::mqtt::{InboundMessage, MqttError, MqttTransport};
use crate::persistence::ConfigStore;
use crate::sync::{SyncConfig, Topic, TOPIC_PING};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrokerCall {
    Connect,
    Subscribe(String),
    Unsubscribe(String),
    Publish(String, String),
    Disconnect,
}

#[derive(Default)]
struct BrokerState {
    calls: Vec<BrokerCall>,
    inbound: Option<mpsc::Sender<InboundMessage>>,
    subscriptions: BTreeSet<String>,
    echo_pings: bool,
    pings_to_drop: usize,
    failing_connects: usize,
    retained: bool,
}

/// Shared view of a fake broker. Transports created from it all talk to the
/// same state.
#[derive(Clone, Default)]
pub struct MockBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl MockBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transport(&self) -> Box<dyn MqttTransport> {
        Box::new(MockTransport {
            broker: self.clone(),
        })
    }

    pub fn calls(&self) -> Vec<BrokerCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn connects(&self) -> usize {
        self.calls()
            .iter()
            .filter(|call| **call == BrokerCall::Connect)
            .count()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                BrokerCall::Publish(topic, payload) => Some((topic, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn subscriptions(&self) -> BTreeSet<String> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    /// Answer pings on `hassping` like the real broker does.
    pub fn echo_pings(&self, enabled: bool) {
        self.state.lock().unwrap().echo_pings = enabled;
    }

    /// Swallow the next `count` pings even when echoing.
    pub fn drop_pings(&self, count: usize) {
        self.state.lock().unwrap().pings_to_drop = count;
    }

    /// Every subscribe is answered with a retained `on` for that topic, the
    /// way the broker replays the last message.
    pub fn retain_on_subscribe(&self, enabled: bool) {
        self.state.lock().unwrap().retained = enabled;
    }

    pub fn fail_connects(&self, count: usize) {
        self.state.lock().unwrap().failing_connects = count;
    }

    /// Simulates the event loop dying: the inbound channel closes.
    pub fn drop_link(&self) {
        self.state.lock().unwrap().inbound = None;
    }

    pub async fn inject(&self, topic: &str, payload: &str) {
        let sender = self.state.lock().unwrap().inbound.clone();
        if let Some(sender) = sender {
            let _ = sender.send(InboundMessage::from_topic(topic, payload)).await;
        }
    }
}

struct MockTransport {
    broker: MockBroker,
}

#[async_trait]
impl MqttTransport for MockTransport {
    async fn connect(&mut self) -> Result<mpsc::Receiver<InboundMessage>, MqttError> {
        let mut state = self.broker.state.lock().unwrap();
        state.calls.push(BrokerCall::Connect);
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(MqttError::ConnectionError("connection refused".to_string()));
        }
        let (tx, rx) = mpsc::channel(100);
        state.inbound = Some(tx);
        Ok(rx)
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        let mut state = self.broker.state.lock().unwrap();
        state.calls.push(BrokerCall::Subscribe(topic.to_string()));
        state.subscriptions.insert(topic.to_string());
        if state.retained && topic != TOPIC_PING {
            if let Some(inbound) = &state.inbound {
                let _ = inbound.try_send(InboundMessage::from_topic(topic, "on"));
            }
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), MqttError> {
        let mut state = self.broker.state.lock().unwrap();
        state.calls.push(BrokerCall::Unsubscribe(topic.to_string()));
        state.subscriptions.remove(topic);
        Ok(())
    }

    async fn publish(&mut self, topic: &str, payload: &str) -> Result<(), MqttError> {
        let mut state = self.broker.state.lock().unwrap();
        state
            .calls
            .push(BrokerCall::Publish(topic.to_string(), payload.to_string()));
        if topic == TOPIC_PING && state.echo_pings {
            if state.pings_to_drop > 0 {
                state.pings_to_drop -= 1;
            } else if let Some(inbound) = &state.inbound {
                let _ = inbound.try_send(InboundMessage::from_topic(topic, payload));
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), MqttError> {
        let mut state = self.broker.state.lock().unwrap();
        state.calls.push(BrokerCall::Disconnect);
        state.inbound = None;
        state.subscriptions.clear();
        Ok(())
    }
}

pub struct FakeHost {
    states: Mutex<BTreeMap<String, EntityState>>,
    areas: Mutex<Vec<(Area, Vec<String>)>>,
    calls: Mutex<Vec<Command>>,
    changes: broadcast::Sender<StateChanged>,
    started: watch::Sender<bool>,
}

impl FakeHost {
    /// A host that has already finished starting.
    pub fn new() -> Self {
        let host = Self::starting();
        host.mark_started();
        host
    }

    /// A host still loading; `wait_until_started` blocks until
    /// [`mark_started`](Self::mark_started).
    pub fn starting() -> Self {
        let (changes, _) = broadcast::channel(64);
        let (started, _) = watch::channel(false);
        Self {
            states: Mutex::new(BTreeMap::new()),
            areas: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            changes,
            started,
        }
    }

    pub fn mark_started(&self) {
        self.started.send_replace(true);
    }

    /// Stores the state and announces the change.
    pub fn set_state(&self, state: EntityState) {
        let change = StateChanged {
            entity_id: state.entity_id.clone(),
            new_state: Some(state.clone()),
        };
        self.states
            .lock()
            .unwrap()
            .insert(state.entity_id.clone(), state);
        let _ = self.changes.send(change);
    }

    pub fn add_area(&self, area: Area, members: &[&str]) {
        let members = members.iter().map(|id| id.to_string()).collect();
        self.areas.lock().unwrap().push((area, members));
    }

    pub fn calls(&self) -> Vec<Command> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl HomePlatform for FakeHost {
    async fn state(&self, entity_id: &str) -> Option<EntityState> {
        self.states.lock().unwrap().get(entity_id).cloned()
    }

    async fn entities(&self, domains: &[&str]) -> Vec<EntityState> {
        self.states
            .lock()
            .unwrap()
            .values()
            .filter(|state| domains.contains(&domain_of(&state.entity_id)))
            .cloned()
            .collect()
    }

    async fn areas(&self) -> Vec<Area> {
        self.areas
            .lock()
            .unwrap()
            .iter()
            .map(|(area, _)| area.clone())
            .collect()
    }

    async fn area_entities(&self, area_id: &str) -> Vec<String> {
        self.areas
            .lock()
            .unwrap()
            .iter()
            .find(|(area, _)| area.id == area_id)
            .map(|(_, members)| members.clone())
            .unwrap_or_default()
    }

    fn subscribe_state_changes(&self) -> broadcast::Receiver<StateChanged> {
        self.changes.subscribe()
    }

    async fn wait_until_started(&self) {
        let mut started = self.started.subscribe();
        let _ = started.wait_for(|started| *started).await;
    }

    async fn call_service(&self, command: &Command) -> Result<(), HostError> {
        self.calls.lock().unwrap().push(command.clone());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryCall {
    Create(Topic, String),
    Rename(Topic, String),
    Delete(Topic),
}

/// Directory holding topics in memory. Only mutations are recorded.
#[derive(Default)]
pub struct FakeDirectory {
    topics: Mutex<BTreeMap<Topic, String>>,
    calls: Mutex<Vec<DirectoryCall>>,
}

impl FakeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_topic(self, topic: &Topic, name: &str) -> Self {
        self.topics
            .lock()
            .unwrap()
            .insert(topic.clone(), name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn name_of(&self, topic: &Topic) -> Option<String> {
        self.topics.lock().unwrap().get(topic).cloned()
    }
}

#[async_trait]
impl TopicDirectory for FakeDirectory {
    async fn fetch_all_topics(&self) -> Result<BTreeMap<Topic, String>, DirectoryError> {
        Ok(self.topics.lock().unwrap().clone())
    }

    async fn create_topic(&self, topic: &Topic, name: &str) -> Result<(), DirectoryError> {
        self.calls
            .lock()
            .unwrap()
            .push(DirectoryCall::Create(topic.clone(), name.to_string()));
        self.topics
            .lock()
            .unwrap()
            .insert(topic.clone(), name.to_string());
        Ok(())
    }

    async fn rename_topic(&self, topic: &Topic, name: &str) -> Result<(), DirectoryError> {
        self.calls
            .lock()
            .unwrap()
            .push(DirectoryCall::Rename(topic.clone(), name.to_string()));
        if let Some(existing) = self.topics.lock().unwrap().get_mut(topic) {
            *existing = name.to_string();
        }
        Ok(())
    }

    async fn delete_topic(&self, topic: &Topic) -> Result<(), DirectoryError> {
        self.calls
            .lock()
            .unwrap()
            .push(DirectoryCall::Delete(topic.clone()));
        self.topics.lock().unwrap().remove(topic);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryConfigStore {
    configs: Mutex<BTreeMap<Topic, SyncConfig>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, topic: &Topic, config: SyncConfig) -> Self {
        self.configs.lock().unwrap().insert(topic.clone(), config);
        self
    }

    pub fn get(&self, topic: &Topic) -> Option<SyncConfig> {
        self.configs.lock().unwrap().get(topic).cloned()
    }
}

#[async_trait]
impl ConfigStore for MemoryConfigStore {
    async fn load_all(&self) -> Result<BTreeMap<Topic, SyncConfig>> {
        Ok(self.configs.lock().unwrap().clone())
    }

    async fn save(&self, topic: &Topic, config: &SyncConfig) -> Result<()> {
        let mut configs = self.configs.lock().unwrap();
        if config.is_empty() {
            configs.remove(topic);
        } else {
            configs.insert(topic.clone(), config.clone());
        }
        Ok(())
    }

    async fn remove(&self, topic: &Topic) -> Result<()> {
        self.configs.lock().unwrap().remove(topic);
        Ok(())
    }
}
