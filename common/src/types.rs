#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanCommand {
    On,
    Off,
    Invalid,
}

impl FanCommand {
    /// Parses an inbound payload. Matching is case-insensitive and ignores
    /// surrounding whitespace.
    pub fn parse(payload: &str) -> Self {
        let trimmed = payload.trim();
        if trimmed.eq_ignore_ascii_case("ON") {
            Self::On
        } else if trimmed.eq_ignore_ascii_case("OFF") {
            Self::Off
        } else {
            Self::Invalid
        }
    }

    pub fn from_bytes(payload: &[u8]) -> Self {
        match std::str::from_utf8(payload) {
            Ok(text) => Self::parse(text),
            Err(_) => Self::Invalid,
        }
    }

    pub fn target(self) -> Option<bool> {
        match self {
            Self::On => Some(true),
            Self::Off => Some(false),
            Self::Invalid => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandEvent {
    pub value: FanCommand,
    pub received_at_ms: u64,
}

impl CommandEvent {
    pub fn new(value: FanCommand, received_at_ms: u64) -> Self {
        Self {
            value,
            received_at_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanState {
    pub is_on: bool,
}

impl FanState {
    pub fn as_str(self) -> &'static str {
        fan_payload(self.is_on)
    }
}

pub fn fan_payload(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureSample {
    pub celsius: f64,
    pub taken_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentStatus {
    Online,
    Offline,
}

impl AgentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Starting,
    Running,
    ShuttingDown,
    Stopped,
}

impl SyncState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "STARTING",
            Self::Running => "RUNNING",
            Self::ShuttingDown => "SHUTTING_DOWN",
            Self::Stopped => "STOPPED",
        }
    }
}

/// Formats a temperature with one fractional digit, rounding exact ties
/// away from zero.
///
/// Only values whose binary representation sits exactly on a hundredths
/// tie (`x.25`, `x.75`) need the nudge; everything else already formats
/// from its exact binary value, so `23.45` (stored just below the tie)
/// stays `23.4`.
pub fn format_tenths(value: f64) -> String {
    let quarters = value * 4.0;
    if value.is_finite() && quarters.fract() == 0.0 && quarters % 2.0 != 0.0 {
        let nudged = value + value.signum() * 0.01;
        return format!("{nudged:.1}");
    }
    format!("{value:.1}")
}
