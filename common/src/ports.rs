//! Seams between the control core and the hardware or transport behind it.
//!
//! The agent binary supplies real implementations (sysfs, GPIO, SSD1306,
//! MQTT); tests supply recording fakes.

use crate::{
    display::PixelBuffer,
    error::{DisplayError, HardwareError, PublishError, SensorError},
    output::Level,
};

/// Raw temperature source reporting millidegrees Celsius.
pub trait TemperatureSource {
    fn read_millidegrees(&mut self) -> Result<i64, SensorError>;
}

/// A single physical output line.
pub trait DigitalOutput {
    fn write(&mut self, level: Level) -> Result<(), HardwareError>;

    /// Returns the line to the OS. Called once during shutdown.
    fn release(&mut self) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// A monochrome panel that shows whole frames.
pub trait DisplaySink {
    fn init(&mut self) -> Result<(), DisplayError>;

    /// Clears the panel buffer, then pushes `frame`.
    fn show(&mut self, frame: &PixelBuffer) -> Result<(), DisplayError>;

    fn release(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Outbound half of the messaging link. Calls must not block on delivery.
pub trait Publisher {
    fn publish(&mut self, topic: &str, payload: &str, retain: bool) -> Result<(), PublishError>;

    fn disconnect(&mut self) -> Result<(), PublishError>;
}
