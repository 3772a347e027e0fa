use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{
    error::ConfigError,
    topics::{TOPIC_FAN_STATE, TOPIC_STATUS, TOPIC_TEMPERATURE},
};

pub const CONFIG_PATH_ENV: &str = "FANCTL_CONFIG";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Polarity {
    ActiveHigh,
    ActiveLow,
}

impl FromStr for Polarity {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "active-high" | "high" => Ok(Self::ActiveHigh),
            "active-low" | "low" => Ok(Self::ActiveLow),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DebounceMode {
    /// Any command inside the window after an accepted one is dropped.
    Time,
    /// Only a repeat of the last accepted command is dropped inside the window.
    Content,
}

impl FromStr for DebounceMode {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "time" => Ok(Self::Time),
            "content" => Ok(Self::Content),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanDrive {
    /// Plain enable line, e.g. the EN pin of a boost converter.
    Enable,
    /// PWM-capable pin driven at 0 % or 100 % duty.
    Pwm,
}

impl FromStr for FanDrive {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "enable" => Ok(Self::Enable),
            "pwm" => Ok(Self::Pwm),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub poll_interval_ms: u64,
    pub display_heartbeat_ms: u64,
    pub temp_change_threshold_c: f64,
    pub debounce_ms: u64,
    pub debounce_mode: DebounceMode,
    pub loop_tick_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            display_heartbeat_ms: 30_000,
            temp_change_threshold_c: 0.5,
            debounce_ms: 500,
            debounce_mode: DebounceMode::Time,
            loop_tick_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub user: String,
    pub pass: String,
    pub qos: u8,
    pub keep_alive_secs: u64,
    pub retain_fan_state: bool,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "fanctl-agent".to_string(),
            user: String::new(),
            pass: String::new(),
            qos: 1,
            keep_alive_secs: 60,
            retain_fan_state: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TopicConfig {
    pub temperature: String,
    pub fan: String,
    pub status: String,
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            temperature: TOPIC_TEMPERATURE.to_string(),
            fan: TOPIC_FAN_STATE.to_string(),
            status: TOPIC_STATUS.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HardwareConfig {
    pub fan_pin: u8,
    pub polarity: Polarity,
    pub drive: FanDrive,
    pub pwm_frequency_hz: u32,
    pub thermal_path: String,
    pub i2c_bus: String,
    pub display_address: u8,
    pub display_width: u32,
    pub display_height: u32,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            fan_pin: 17,
            polarity: Polarity::ActiveHigh,
            drive: FanDrive::Enable,
            pwm_frequency_hz: 100,
            thermal_path: "/sys/class/thermal/thermal_zone0/temp".to_string(),
            i2c_bus: "/dev/i2c-1".to_string(),
            display_address: 0x3C,
            display_width: 128,
            display_height: 64,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub control: ControlConfig,
    pub mqtt: MqttConfig,
    pub topics: TopicConfig,
    pub hardware: HardwareConfig,
}

impl AgentConfig {
    /// Defaults, then the JSON file named by `FANCTL_CONFIG` (read through
    /// `read_file`), then environment overrides, then validation.
    pub fn load<L, R>(lookup: L, read_file: R) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
        R: FnOnce(&str) -> std::io::Result<Vec<u8>>,
    {
        let mut config = match lookup(CONFIG_PATH_ENV) {
            Some(path) => {
                let raw = read_file(&path).map_err(|err| ConfigError::File {
                    path: path.clone(),
                    reason: err.to_string(),
                })?;
                Self::from_json(&raw).map_err(|err| ConfigError::File {
                    path,
                    reason: err.to_string(),
                })?
            }
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }

    pub fn apply_env<L>(&mut self, lookup: L) -> Result<(), ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mqtt = &mut self.mqtt;
        if let Some(value) = lookup("MQTT_HOST") {
            mqtt.host = value;
        }
        if let Some(value) = lookup("MQTT_PORT") {
            mqtt.port = parse_number("MQTT_PORT", value, "port number")?;
        }
        if let Some(value) = lookup("MQTT_CLIENT_ID") {
            mqtt.client_id = value;
        }
        if let Some(value) = lookup("MQTT_USER") {
            mqtt.user = value;
        }
        if let Some(value) = lookup("MQTT_PASS") {
            mqtt.pass = value;
        }
        if let Some(value) = lookup("MQTT_QOS") {
            mqtt.qos = parse_number("MQTT_QOS", value, "QoS level")?;
        }
        if let Some(value) = lookup("MQTT_KEEP_ALIVE") {
            mqtt.keep_alive_secs = parse_number("MQTT_KEEP_ALIVE", value, "seconds")?;
        }
        if let Some(value) = lookup("FAN_RETAIN") {
            mqtt.retain_fan_state = parse_bool("FAN_RETAIN", value)?;
        }

        let topics = &mut self.topics;
        if let Some(value) = lookup("TOPIC_TEMP") {
            topics.temperature = value;
        }
        if let Some(value) = lookup("TOPIC_FAN") {
            topics.fan = value;
        }
        if let Some(value) = lookup("TOPIC_STATUS") {
            topics.status = value;
        }

        let control = &mut self.control;
        if let Some(value) = lookup("UPDATE_INTERVAL") {
            control.poll_interval_ms = parse_seconds("UPDATE_INTERVAL", value)?;
        }
        if let Some(value) = lookup("OLED_REFRESH_HEARTBEAT") {
            control.display_heartbeat_ms = parse_seconds("OLED_REFRESH_HEARTBEAT", value)?;
        }
        if let Some(value) = lookup("TEMP_CHANGE_THRESHOLD") {
            control.temp_change_threshold_c =
                parse_number("TEMP_CHANGE_THRESHOLD", value, "degrees Celsius")?;
        }
        if let Some(value) = lookup("DEBOUNCE_SECONDS") {
            control.debounce_ms = parse_seconds("DEBOUNCE_SECONDS", value)?;
        }
        if let Some(value) = lookup("DEBOUNCE_MODE") {
            control.debounce_mode = parse_keyword("DEBOUNCE_MODE", value, "time|content")?;
        }
        if let Some(value) = lookup("LOOP_TICK_MS") {
            control.loop_tick_ms = parse_number("LOOP_TICK_MS", value, "milliseconds")?;
        }

        let hardware = &mut self.hardware;
        if let Some(value) = lookup("FAN_PIN") {
            hardware.fan_pin = parse_number("FAN_PIN", value, "BCM pin number")?;
        }
        if let Some(value) = lookup("FAN_POLARITY") {
            hardware.polarity =
                parse_keyword("FAN_POLARITY", value, "active-high|active-low")?;
        }
        if let Some(value) = lookup("FAN_DRIVE") {
            hardware.drive = parse_keyword("FAN_DRIVE", value, "enable|pwm")?;
        }
        if let Some(value) = lookup("FAN_PWM_HZ") {
            hardware.pwm_frequency_hz = parse_number("FAN_PWM_HZ", value, "hertz")?;
        }
        if let Some(value) = lookup("THERMAL_PATH") {
            hardware.thermal_path = value;
        }
        if let Some(value) = lookup("OLED_I2C_BUS") {
            hardware.i2c_bus = value;
        }
        if let Some(value) = lookup("OLED_ADDRESS") {
            hardware.display_address = parse_address("OLED_ADDRESS", value)?;
        }
        if let Some(value) = lookup("OLED_WIDTH") {
            hardware.display_width = parse_number("OLED_WIDTH", value, "pixels")?;
        }
        if let Some(value) = lookup("OLED_HEIGHT") {
            hardware.display_height = parse_number("OLED_HEIGHT", value, "pixels")?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mqtt.host.trim().is_empty() {
            return Err(invalid("MQTT_HOST", "cannot be empty"));
        }
        if self.mqtt.port == 0 {
            return Err(invalid("MQTT_PORT", "must be between 1 and 65535"));
        }
        if self.mqtt.qos > 2 {
            return Err(invalid("MQTT_QOS", "must be 0, 1 or 2"));
        }
        for (key, topic) in [
            ("TOPIC_TEMP", &self.topics.temperature),
            ("TOPIC_FAN", &self.topics.fan),
            ("TOPIC_STATUS", &self.topics.status),
        ] {
            if topic.trim().is_empty() {
                return Err(invalid(key, "cannot be empty"));
            }
            if topic.contains(['+', '#']) {
                return Err(invalid(key, "wildcards are not allowed in publish topics"));
            }
        }
        if self.control.poll_interval_ms == 0 {
            return Err(invalid("UPDATE_INTERVAL", "must be greater than zero"));
        }
        if self.control.display_heartbeat_ms == 0 {
            return Err(invalid("OLED_REFRESH_HEARTBEAT", "must be greater than zero"));
        }
        let threshold = self.control.temp_change_threshold_c;
        if !threshold.is_finite() || threshold < 0.0 {
            return Err(invalid(
                "TEMP_CHANGE_THRESHOLD",
                "must be a finite, non-negative number",
            ));
        }
        if !(1..=100).contains(&self.control.loop_tick_ms) {
            return Err(invalid("LOOP_TICK_MS", "must be between 1 and 100"));
        }
        if self.hardware.display_width == 0 || self.hardware.display_height == 0 {
            return Err(invalid("OLED_WIDTH", "display dimensions must be non-zero"));
        }
        if self.hardware.drive == FanDrive::Pwm && self.hardware.pwm_frequency_hz == 0 {
            return Err(invalid("FAN_PWM_HZ", "must be greater than zero"));
        }
        Ok(())
    }

    /// Copy suitable for logging: credentials are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.mqtt.pass.is_empty() {
            copy.mqtt.pass = "***".to_string();
        }
        copy
    }
}

fn invalid(key: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.to_string(),
    }
}

fn parse_number<T: FromStr>(
    key: &'static str,
    value: String,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::Parse {
            key,
            value,
            expected,
        })
}

fn parse_keyword<T: FromStr>(
    key: &'static str,
    value: String,
    expected: &'static str,
) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::Parse {
        key,
        value,
        expected,
    })
}

fn parse_seconds(key: &'static str, value: String) -> Result<u64, ConfigError> {
    let seconds: f64 = parse_number(key, value.clone(), "seconds")?;
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(ConfigError::Parse {
            key,
            value,
            expected: "non-negative seconds",
        });
    }
    Ok((seconds * 1000.0).round() as u64)
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Parse {
            key,
            value,
            expected: "boolean",
        }),
    }
}

fn parse_address(key: &'static str, value: String) -> Result<u8, ConfigError> {
    let trimmed = value.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => trimmed.parse::<u8>(),
    };
    parsed.map_err(|_| ConfigError::Parse {
        key,
        value,
        expected: "I2C address",
    })
}
