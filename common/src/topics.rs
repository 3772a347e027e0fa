pub const TOPIC_TEMPERATURE: &str = "pi/temperature";
pub const TOPIC_FAN_STATE: &str = "pi/fan_state";
pub const TOPIC_STATUS: &str = "pi/status";
