//! Log-only peripherals for running the agent off the Pi.

use tracing::{debug, info, trace};

use fanctl_common::{
    config::HardwareConfig, DigitalOutput, DisplayError, DisplaySink, HardwareError, Level,
    PixelBuffer,
};

pub struct LoggedOutput {
    pin: u8,
    level: Option<Level>,
}

impl DigitalOutput for LoggedOutput {
    fn write(&mut self, level: Level) -> Result<(), HardwareError> {
        if self.level != Some(level) {
            info!(pin = self.pin, ?level, "fan output");
        }
        self.level = Some(level);
        Ok(())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        debug!(pin = self.pin, "fan output released");
        Ok(())
    }
}

pub struct LoggedDisplay {
    bus: String,
    address: u8,
}

impl DisplaySink for LoggedDisplay {
    fn init(&mut self) -> Result<(), DisplayError> {
        info!(bus = %self.bus, address = self.address, "display ready (log only)");
        Ok(())
    }

    fn show(&mut self, frame: &PixelBuffer) -> Result<(), DisplayError> {
        debug!(lit = frame.lit_pixels().count(), "frame");
        if tracing::enabled!(tracing::Level::TRACE) {
            for row in ascii_rows(frame) {
                trace!("{row}");
            }
        }
        Ok(())
    }
}

fn ascii_rows(frame: &PixelBuffer) -> impl Iterator<Item = String> + '_ {
    (0..frame.height()).map(move |y| {
        (0..frame.width())
            .map(|x| if frame.get(x, y) { '#' } else { '.' })
            .collect()
    })
}

pub fn open_output(hardware: &HardwareConfig) -> anyhow::Result<LoggedOutput> {
    Ok(LoggedOutput {
        pin: hardware.fan_pin,
        level: None,
    })
}

pub fn open_display(hardware: &HardwareConfig) -> anyhow::Result<LoggedDisplay> {
    Ok(LoggedDisplay {
        bus: hardware.i2c_bus.clone(),
        address: hardware.display_address,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_rows_mirror_lit_pixels() {
        let mut frame = PixelBuffer::new(4, 2);
        frame.set(1, 0, true);
        frame.set(3, 1, true);

        let rows: Vec<String> = ascii_rows(&frame).collect();
        assert_eq!(rows, vec![".#..", "...#"]);
    }
}
