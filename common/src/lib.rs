pub mod config;
pub mod debounce;
pub mod display;
pub mod error;
pub mod output;
pub mod ports;
pub mod sensor;
pub mod shutdown;
pub mod sync;
pub mod topics;
pub mod types;

pub use config::{AgentConfig, ControlConfig, DebounceMode, FanDrive, MqttConfig, Polarity};
pub use debounce::CommandDebouncer;
pub use display::{PixelBuffer, StatusRenderer};
pub use error::{ConfigError, DisplayError, HardwareError, PublishError, SensorError, StartupError};
pub use output::{Level, OutputController};
pub use ports::{DigitalOutput, DisplaySink, Publisher, TemperatureSource};
pub use shutdown::{CleanupReport, ShutdownFlag};
pub use sync::{DisplaySnapshot, FanSynchronizer, RefreshPolicy};
pub use topics::*;
pub use types::{AgentStatus, CommandEvent, FanCommand, FanState, SyncState, TemperatureSample};
