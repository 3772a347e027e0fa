//! Recording fakes for the synchronizer's ports. Each fake shares its log
//! through `Rc<RefCell<_>>` so tests can inspect it after the fake has been
//! moved into the synchronizer.

#![allow(dead_code)]

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use fanctl_common::{
    AgentConfig, DigitalOutput, DisplayError, DisplaySink, FanSynchronizer, HardwareError, Level,
    PixelBuffer, PublishError, Publisher, SensorError, TemperatureSource,
};

pub type TestSynchronizer =
    FanSynchronizer<ScriptedSensor, RecordingPin, RecordingDisplay, RecordingPublisher>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

/// Serves queued readings; `None` is a failed read. The last entry repeats.
#[derive(Clone, Default)]
pub struct ScriptedSensor {
    pub readings: Rc<RefCell<VecDeque<Option<i64>>>>,
}

impl TemperatureSource for ScriptedSensor {
    fn read_millidegrees(&mut self) -> Result<i64, SensorError> {
        let mut readings = self.readings.borrow_mut();
        let next = if readings.len() > 1 {
            readings.pop_front().flatten()
        } else {
            readings.front().copied().flatten()
        };
        next.ok_or_else(|| SensorError::Unavailable("scripted failure".to_string()))
    }
}

#[derive(Debug, Default)]
pub struct PinLog {
    pub writes: Vec<Level>,
    pub fail_writes: usize,
    pub lost: bool,
    pub released: bool,
}

#[derive(Clone, Default)]
pub struct RecordingPin {
    pub log: Rc<RefCell<PinLog>>,
}

impl DigitalOutput for RecordingPin {
    fn write(&mut self, level: Level) -> Result<(), HardwareError> {
        let mut log = self.log.borrow_mut();
        if log.lost {
            return Err(HardwareError::Lost("gpio chip removed".to_string()));
        }
        if log.fail_writes > 0 {
            log.fail_writes -= 1;
            return Err(HardwareError::Write("transient".to_string()));
        }
        log.writes.push(level);
        Ok(())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        self.log.borrow_mut().released = true;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct DisplayLog {
    pub frames: Vec<PixelBuffer>,
    pub init_fails: bool,
    pub show_fails: bool,
    pub initialized: bool,
    pub released: bool,
}

#[derive(Clone, Default)]
pub struct RecordingDisplay {
    pub log: Rc<RefCell<DisplayLog>>,
}

impl DisplaySink for RecordingDisplay {
    fn init(&mut self) -> Result<(), DisplayError> {
        let mut log = self.log.borrow_mut();
        if log.init_fails {
            return Err(DisplayError::Init("no ack at 0x3c".to_string()));
        }
        log.initialized = true;
        Ok(())
    }

    fn show(&mut self, frame: &PixelBuffer) -> Result<(), DisplayError> {
        let mut log = self.log.borrow_mut();
        if log.show_fails {
            return Err(DisplayError::Flush("i2c nack".to_string()));
        }
        log.frames.push(frame.clone());
        Ok(())
    }

    fn release(&mut self) -> Result<(), DisplayError> {
        self.log.borrow_mut().released = true;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct BrokerLog {
    pub messages: Vec<Message>,
    pub fail_publish: bool,
    pub fail_disconnect: bool,
    pub disconnects: usize,
}

impl BrokerLog {
    pub fn on_topic(&self, topic: &str) -> Vec<Message> {
        self.messages
            .iter()
            .filter(|message| message.topic == topic)
            .cloned()
            .collect()
    }

    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.on_topic(topic)
            .into_iter()
            .map(|message| message.payload)
            .collect()
    }
}

#[derive(Clone, Default)]
pub struct RecordingPublisher {
    pub log: Rc<RefCell<BrokerLog>>,
}

impl Publisher for RecordingPublisher {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), PublishError> {
        let mut log = self.log.borrow_mut();
        if log.fail_publish {
            return Err(PublishError::Rejected {
                topic: topic.to_string(),
                reason: "request channel full".to_string(),
            });
        }
        log.messages.push(Message {
            topic: topic.to_string(),
            payload: payload.to_string(),
            retain,
        });
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), PublishError> {
        let mut log = self.log.borrow_mut();
        if log.fail_disconnect {
            return Err(PublishError::Disconnect("event loop gone".to_string()));
        }
        log.disconnects += 1;
        Ok(())
    }
}

/// All fakes for one synchronizer plus the handles to inspect them.
#[derive(Default)]
pub struct Rig {
    pub sensor: ScriptedSensor,
    pub pin: RecordingPin,
    pub display: RecordingDisplay,
    pub broker: RecordingPublisher,
}

impl Rig {
    /// Readings in degrees Celsius; `None` is a failed read.
    pub fn with_readings(celsius: &[Option<f64>]) -> Self {
        let rig = Self::default();
        rig.sensor.readings.borrow_mut().extend(
            celsius
                .iter()
                .map(|reading| reading.map(|c| (c * 1000.0).round() as i64)),
        );
        rig
    }

    pub fn build(&self, config: &AgentConfig) -> TestSynchronizer {
        FanSynchronizer::new(
            config,
            self.sensor.clone(),
            self.pin.clone(),
            self.display.clone(),
            self.broker.clone(),
        )
    }

    pub fn writes(&self) -> Vec<Level> {
        self.pin.log.borrow().writes.clone()
    }

    pub fn frame_count(&self) -> usize {
        self.display.log.borrow().frames.len()
    }

    pub fn payloads(&self, topic: &str) -> Vec<String> {
        self.broker.log.borrow().payloads(topic)
    }

    pub fn messages(&self, topic: &str) -> Vec<Message> {
        self.broker.log.borrow().on_topic(topic)
    }
}

pub fn config() -> AgentConfig {
    let mut config = AgentConfig::default();
    config.control.poll_interval_ms = 5_000;
    config.control.display_heartbeat_ms = 600_000;
    config.control.temp_change_threshold_c = 0.5;
    config.control.debounce_ms = 200;
    config
}
