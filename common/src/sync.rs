use tracing::{debug, error, info, warn};

use crate::{
    config::{AgentConfig, ControlConfig, TopicConfig},
    debounce::CommandDebouncer,
    display::StatusRenderer,
    error::{HardwareError, StartupError},
    output::OutputController,
    ports::{DigitalOutput, DisplaySink, Publisher, TemperatureSource},
    sensor::SensorReader,
    shutdown::{Cleanup, CleanupReport},
    types::{
        fan_payload, format_tenths, AgentStatus, CommandEvent, FanState, SyncState,
        TemperatureSample,
    },
};

/// What the panel currently shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplaySnapshot {
    pub temp: Option<f64>,
    pub fan_on: bool,
    pub rendered_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshPolicy {
    pub threshold_c: f64,
    pub heartbeat_ms: u64,
}

impl RefreshPolicy {
    pub fn from_config(control: &ControlConfig) -> Self {
        Self {
            threshold_c: control.temp_change_threshold_c,
            heartbeat_ms: control.display_heartbeat_ms,
        }
    }

    pub fn needs_refresh(
        &self,
        snapshot: Option<&DisplaySnapshot>,
        last_temp: Option<f64>,
        sample: Option<f64>,
        fan_on: bool,
        now_ms: u64,
    ) -> bool {
        let Some(snapshot) = snapshot else {
            return true;
        };

        if now_ms.saturating_sub(snapshot.rendered_at_ms) >= self.heartbeat_ms {
            return true;
        }
        if snapshot.fan_on != fan_on {
            return true;
        }

        match (sample, last_temp) {
            (Some(new), Some(last)) => (new - last).abs() >= self.threshold_c,
            // First good reading, or the sensor just dropped out.
            (Some(_), None) | (None, Some(_)) => true,
            (None, None) => false,
        }
    }
}

/// Owns fan and temperature state and keeps hardware, display and broker
/// in step with it. Driven by one loop calling [`FanSynchronizer::step`].
pub struct FanSynchronizer<S, O, D, P> {
    control: ControlConfig,
    topics: TopicConfig,
    retain_fan_state: bool,

    sensor: SensorReader<S>,
    output: OutputController<O>,
    display: D,
    renderer: StatusRenderer,
    publisher: P,
    debouncer: CommandDebouncer,
    refresh: RefreshPolicy,

    state: SyncState,
    fan: FanState,
    last_temp: Option<TemperatureSample>,
    last_poll_ms: Option<u64>,
    sensor_down: bool,
    snapshot: Option<DisplaySnapshot>,
}

impl<S, O, D, P> FanSynchronizer<S, O, D, P>
where
    S: TemperatureSource,
    O: DigitalOutput,
    D: DisplaySink,
    P: Publisher,
{
    pub fn new(config: &AgentConfig, source: S, pin: O, display: D, publisher: P) -> Self {
        let control = config.control.clone();
        Self {
            debouncer: CommandDebouncer::new(control.debounce_ms, control.debounce_mode),
            refresh: RefreshPolicy::from_config(&control),
            renderer: StatusRenderer::new(
                config.hardware.display_width,
                config.hardware.display_height,
            ),
            control,
            topics: config.topics.clone(),
            retain_fan_state: config.mqtt.retain_fan_state,
            sensor: SensorReader::new(source),
            output: OutputController::new(pin, config.hardware.polarity),
            display,
            publisher,
            state: SyncState::Starting,
            fan: FanState::default(),
            last_temp: None,
            last_poll_ms: None,
            sensor_down: false,
            snapshot: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn fan_state(&self) -> FanState {
        self.fan
    }

    pub fn last_temperature(&self) -> Option<TemperatureSample> {
        self.last_temp
    }

    pub fn snapshot(&self) -> Option<DisplaySnapshot> {
        self.snapshot
    }

    /// Forces the fan off, brings up the display, announces the agent and
    /// takes the first reading.
    pub fn start(&mut self, now_ms: u64) -> Result<(), StartupError> {
        if self.state != SyncState::Starting {
            return Err(StartupError::AlreadyStarted);
        }

        self.output.set_level(false).map_err(StartupError::Output)?;
        self.fan = FanState { is_on: false };
        self.display.init().map_err(StartupError::Display)?;

        let status_topic = self.topics.status.clone();
        self.publish(&status_topic, AgentStatus::Online.as_str(), true);
        self.publish_fan_state();

        self.poll(now_ms);
        self.state = SyncState::Running;
        info!(
            state = self.state.as_str(),
            poll_interval_ms = self.control.poll_interval_ms,
            heartbeat_ms = self.control.display_heartbeat_ms,
            "fan synchronizer running"
        );
        Ok(())
    }

    /// One loop iteration: poll the sensor when due, then apply commands in
    /// arrival order.
    pub fn step<I>(&mut self, now_ms: u64, commands: I) -> SyncState
    where
        I: IntoIterator<Item = CommandEvent>,
    {
        if self.state != SyncState::Running {
            return self.state;
        }

        if self.poll_due(now_ms) {
            self.poll(now_ms);
        }

        for event in commands {
            if self.state != SyncState::Running {
                break;
            }
            self.apply_command(event);
        }

        self.state
    }

    pub fn poll_due(&self, now_ms: u64) -> bool {
        self.last_poll_ms
            .map(|last| now_ms.saturating_sub(last) >= self.control.poll_interval_ms)
            .unwrap_or(true)
    }

    /// Drives the output, then records and announces the new state. Returns
    /// `Ok(false)` without touching hardware when the fan is already there.
    pub fn set_fan(&mut self, on: bool) -> Result<bool, HardwareError> {
        if self.fan.is_on == on {
            return Ok(false);
        }

        self.output.set_level(on)?;
        self.fan.is_on = on;
        info!(fan = fan_payload(on), "fan state changed");
        self.publish_fan_state();
        Ok(true)
    }

    /// Runs the teardown sequence once. Later calls return `None`.
    pub fn shutdown(&mut self) -> Option<CleanupReport> {
        if self.state == SyncState::Stopped {
            return None;
        }
        self.state = SyncState::ShuttingDown;
        info!("fan synchronizer shutting down");

        let mut cleanup = Cleanup::new();

        let forced_off = self.output.set_level(false);
        if forced_off.is_ok() {
            self.fan.is_on = false;
        }
        cleanup.step("force fan off", forced_off);
        cleanup.step(
            "announce offline",
            self.publisher
                .publish(&self.topics.status, AgentStatus::Offline.as_str(), true),
        );
        cleanup.step("disconnect messaging", self.publisher.disconnect());
        cleanup.step("release fan output", self.output.release());
        cleanup.step("release display", self.display.release());

        self.state = SyncState::Stopped;
        let report = cleanup.finish();
        info!(failures = report.failures.len(), "fan synchronizer stopped");
        Some(report)
    }

    fn poll(&mut self, now_ms: u64) {
        self.last_poll_ms = Some(now_ms);

        let sample = match self.sensor.read(now_ms) {
            Ok(sample) => {
                let topic = self.topics.temperature.clone();
                self.publish(&topic, &format_tenths(sample.celsius), false);
                Some(sample)
            }
            Err(err) => {
                warn!("temperature read failed: {err}");
                None
            }
        };

        let new = sample.map(|sample| sample.celsius);
        let last = self.last_temp.map(|sample| sample.celsius);
        // Only the first failed read of an outage changes what is shown.
        let reference = if new.is_none() && self.sensor_down {
            None
        } else {
            last
        };
        self.sensor_down = new.is_none();
        if self.refresh.needs_refresh(
            self.snapshot.as_ref(),
            reference,
            new,
            self.fan.is_on,
            now_ms,
        ) {
            let shown = new.or(last).unwrap_or(0.0);
            self.render(Some(shown), now_ms);
        }

        if sample.is_some() {
            self.last_temp = sample;
        }
    }

    fn render(&mut self, temp: Option<f64>, now_ms: u64) {
        let frame = self.renderer.render(temp, self.fan.is_on);
        match self.display.show(&frame) {
            Ok(()) => {
                let rendered_at_ms = self
                    .snapshot
                    .map_or(now_ms, |previous| previous.rendered_at_ms.max(now_ms));
                self.snapshot = Some(DisplaySnapshot {
                    temp,
                    fan_on: self.fan.is_on,
                    rendered_at_ms,
                });
                debug!(?temp, fan_on = self.fan.is_on, "display refreshed");
            }
            Err(err) => warn!("display refresh failed: {err}"),
        }
    }

    fn apply_command(&mut self, event: CommandEvent) {
        let Some(target) = event.value.target() else {
            warn!("ignoring invalid fan command");
            return;
        };

        // Echoes of our own retained state must not restart the window.
        if target == self.fan.is_on {
            debug!(fan = self.fan.as_str(), "fan already in requested state");
            return;
        }

        if self.debouncer.accept(event).is_none() {
            debug!(
                received_at_ms = event.received_at_ms,
                "fan command suppressed by debounce window"
            );
            return;
        }

        match self.set_fan(target) {
            Ok(_) => {}
            Err(err) if err.is_fatal() => {
                error!("fan output lost, stopping: {err}");
                self.state = SyncState::ShuttingDown;
            }
            Err(err) => warn!(
                fan = self.fan.as_str(),
                "fan output write failed, keeping previous state: {err}"
            ),
        }
    }

    fn publish_fan_state(&mut self) {
        let topic = self.topics.fan.clone();
        let retain = self.retain_fan_state;
        self.publish(&topic, self.fan.as_str(), retain);
    }

    fn publish(&mut self, topic: &str, payload: &str, retain: bool) {
        if let Err(err) = self.publisher.publish(topic, payload, retain) {
            warn!("publish to {topic} failed: {err}");
        }
    }
}
