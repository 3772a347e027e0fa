use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Incoming, LastWill, MqttOptions, Outgoing, QoS};
use tokio::{
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use fanctl_common::{
    AgentConfig, AgentStatus, CommandEvent, FanCommand, PublishError, Publisher,
};

use crate::host::monotonic_ms;

const REQUEST_CAPACITY: usize = 64;
const MAX_COMMAND_PAYLOAD_BYTES: usize = 64;
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        2 => QoS::ExactlyOnce,
        _ => QoS::AtLeastOnce,
    }
}

/// Builds the client with a retained OFFLINE last will on the status topic.
pub fn connect(config: &AgentConfig) -> (AsyncClient, EventLoop) {
    let mqtt = &config.mqtt;
    let mut options = MqttOptions::new(mqtt.client_id.clone(), mqtt.host.clone(), mqtt.port);
    options.set_keep_alive(Duration::from_secs(mqtt.keep_alive_secs));
    options.set_last_will(LastWill::new(
        config.topics.status.clone(),
        AgentStatus::Offline.as_str().as_bytes().to_vec(),
        qos_from_level(mqtt.qos),
        true,
    ));
    if !mqtt.user.is_empty() {
        options.set_credentials(mqtt.user.clone(), mqtt.pass.clone());
    }
    AsyncClient::new(options, REQUEST_CAPACITY)
}

/// [`Publisher`] over the client's request queue. Never blocks the control
/// loop: a full queue is reported as a rejected publish.
pub struct MqttPublisher {
    client: AsyncClient,
    qos: QoS,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient, qos: QoS) -> Self {
        Self { client, qos }
    }
}

impl Publisher for MqttPublisher {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, self.qos, retain, payload.as_bytes().to_vec())
            .map_err(|err| PublishError::Rejected {
                topic: topic.to_string(),
                reason: err.to_string(),
            })
    }

    fn disconnect(&mut self) -> Result<(), PublishError> {
        self.client
            .try_disconnect()
            .map_err(|err| PublishError::Disconnect(err.to_string()))
    }
}

/// Reconnect delay, doubling from one second up to thirty.
#[derive(Debug)]
struct Backoff {
    next: Duration,
}

impl Backoff {
    const INITIAL: Duration = Duration::from_secs(1);
    const MAX: Duration = Duration::from_secs(30);

    fn new() -> Self {
        Self {
            next: Self::INITIAL,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(Self::MAX);
        delay
    }

    fn reset(&mut self) {
        self.next = Self::INITIAL;
    }
}

/// Counts broker sessions. The synchronizer queues the first ONLINE itself,
/// so only reconnects re-announce availability.
#[derive(Debug, Default)]
struct Sessions {
    established: u32,
}

impl Sessions {
    /// Returns `true` when this connect must re-announce ONLINE.
    fn connected(&mut self) -> bool {
        self.established = self.established.saturating_add(1);
        self.established > 1
    }
}

/// Polls the event loop until the client disconnects. Fan commands are
/// stamped on arrival and queued for the control loop.
pub fn spawn_event_loop(
    client: AsyncClient,
    mut eventloop: EventLoop,
    config: &AgentConfig,
    commands: mpsc::Sender<CommandEvent>,
) -> JoinHandle<()> {
    let fan_topic = config.topics.fan.clone();
    let status_topic = config.topics.status.clone();
    let qos = qos_from_level(config.mqtt.qos);

    tokio::spawn(async move {
        let mut backoff = Backoff::new();
        let mut sessions = Sessions::default();
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::Publish(message))) => {
                    if message.topic == fan_topic {
                        forward_command(&commands, &message.payload);
                    }
                }
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    info!("mqtt connected");
                    backoff.reset();
                    // Sessions are clean, so every connect needs a fresh
                    // subscription.
                    if let Err(err) = client.try_subscribe(fan_topic.clone(), qos) {
                        warn!("subscribe to {fan_topic} failed: {err}");
                    }
                    if !sessions.connected() {
                        continue;
                    }
                    if let Err(err) = client.try_publish(
                        status_topic.clone(),
                        qos,
                        true,
                        AgentStatus::Online.as_str().as_bytes().to_vec(),
                    ) {
                        warn!("publish to {status_topic} failed: {err}");
                    }
                }
                Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                    info!("mqtt disconnected");
                    break;
                }
                Ok(_) => {}
                Err(err) => {
                    let delay = backoff.next_delay();
                    warn!(
                        retry_in_ms = delay.as_millis() as u64,
                        "mqtt poll error: {err}"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    })
}

fn forward_command(commands: &mpsc::Sender<CommandEvent>, payload: &[u8]) {
    if payload.len() > MAX_COMMAND_PAYLOAD_BYTES {
        warn!(bytes = payload.len(), "dropping oversized fan command");
        return;
    }

    let event = CommandEvent::new(FanCommand::from_bytes(payload), monotonic_ms());
    match commands.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => warn!("command queue full, dropping fan command"),
        Err(TrySendError::Closed(_)) => debug!("control loop gone, dropping fan command"),
    }
}

/// Gives the event loop a bounded window to flush OFFLINE and the
/// disconnect before the process exits.
pub async fn await_disconnect(task: JoinHandle<()>) {
    let abort = task.abort_handle();
    match tokio::time::timeout(DISCONNECT_TIMEOUT, task).await {
        Ok(Ok(())) => debug!("mqtt event loop finished"),
        Ok(Err(err)) => warn!("mqtt event loop failed: {err}"),
        Err(_) => {
            warn!(
                timeout_ms = DISCONNECT_TIMEOUT.as_millis() as u64,
                "mqtt did not disconnect in time"
            );
            abort.abort();
        }
    }
}
