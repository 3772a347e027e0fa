//! Raspberry Pi peripherals: fan enable line over rppal, SSD1306 panel over
//! `/dev/i2c-*`.

use std::io::ErrorKind;

use anyhow::{bail, Context};
use linux_embedded_hal::I2cdev;
use rppal::gpio::{self, Gpio, OutputPin};
use ssd1306::{
    mode::BufferedGraphicsMode, prelude::*, size::DisplaySize128x64, I2CDisplayInterface,
    Ssd1306,
};
use tracing::{debug, info};

use fanctl_common::{
    config::{FanDrive, HardwareConfig, Polarity},
    DigitalOutput, DisplayError, DisplaySink, HardwareError, Level, PixelBuffer,
};

type Panel =
    Ssd1306<I2CInterface<I2cdev>, DisplaySize128x64, BufferedGraphicsMode<DisplaySize128x64>>;

pub struct GpioFan {
    pin: OutputPin,
    drive: FanDrive,
    pwm_frequency_hz: f64,
}

impl DigitalOutput for GpioFan {
    fn write(&mut self, level: Level) -> Result<(), HardwareError> {
        match self.drive {
            FanDrive::Enable => {
                match level {
                    Level::High => self.pin.set_high(),
                    Level::Low => self.pin.set_low(),
                }
                Ok(())
            }
            FanDrive::Pwm => {
                let duty = if level == Level::High { 1.0 } else { 0.0 };
                self.pin
                    .set_pwm_frequency(self.pwm_frequency_hz, duty)
                    .map_err(classify)
            }
        }
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        if self.drive == FanDrive::Pwm {
            self.pin.clear_pwm().map_err(classify)?;
        }
        self.pin.set_reset_on_drop(true);
        debug!(pin = self.pin.pin(), "fan output released");
        Ok(())
    }
}

/// Errors that mean the GPIO chip is gone or no longer ours are fatal;
/// anything else may succeed on the next command.
fn classify(err: gpio::Error) -> HardwareError {
    match &err {
        gpio::Error::PermissionDenied(_) => HardwareError::Lost(err.to_string()),
        gpio::Error::Io(io)
            if matches!(io.kind(), ErrorKind::NotFound | ErrorKind::PermissionDenied) =>
        {
            HardwareError::Lost(err.to_string())
        }
        _ => HardwareError::Write(err.to_string()),
    }
}

/// Claims the fan pin already at its inactive level so the fan does not
/// blip on before the synchronizer forces it off.
pub fn open_output(hardware: &HardwareConfig) -> anyhow::Result<GpioFan> {
    let gpio = Gpio::new().context("failed to open GPIO")?;
    let pin = gpio
        .get(hardware.fan_pin)
        .with_context(|| format!("failed to claim GPIO{}", hardware.fan_pin))?;
    let pin = match hardware.polarity {
        Polarity::ActiveHigh => pin.into_output_low(),
        Polarity::ActiveLow => pin.into_output_high(),
    };
    info!(
        pin = hardware.fan_pin,
        drive = ?hardware.drive,
        polarity = ?hardware.polarity,
        "fan output claimed"
    );
    Ok(GpioFan {
        pin,
        drive: hardware.drive,
        pwm_frequency_hz: f64::from(hardware.pwm_frequency_hz),
    })
}

/// SSD1306 panel, opened lazily in [`DisplaySink::init`].
pub struct OledPanel {
    bus: String,
    address: u8,
    panel: Option<Panel>,
}

impl DisplaySink for OledPanel {
    fn init(&mut self) -> Result<(), DisplayError> {
        let i2c = I2cdev::new(&self.bus)
            .map_err(|err| DisplayError::Init(format!("{}: {err}", self.bus)))?;
        let interface = I2CDisplayInterface::new_custom_address(i2c, self.address);
        let mut panel = Ssd1306::new(interface, DisplaySize128x64, DisplayRotation::Rotate0)
            .into_buffered_graphics_mode();
        panel
            .init()
            .map_err(|err| DisplayError::Init(format!("{err:?}")))?;
        panel.clear_buffer();
        panel
            .flush()
            .map_err(|err| DisplayError::Init(format!("{err:?}")))?;

        info!(bus = %self.bus, address = self.address, "display initialized");
        self.panel = Some(panel);
        Ok(())
    }

    fn show(&mut self, frame: &PixelBuffer) -> Result<(), DisplayError> {
        let panel = self
            .panel
            .as_mut()
            .ok_or_else(|| DisplayError::Flush("display not initialized".to_string()))?;
        panel.clear_buffer();
        for (x, y) in frame.lit_pixels() {
            panel.set_pixel(x, y, true);
        }
        panel
            .flush()
            .map_err(|err| DisplayError::Flush(format!("{err:?}")))
    }

    fn release(&mut self) -> Result<(), DisplayError> {
        let Some(mut panel) = self.panel.take() else {
            return Ok(());
        };
        panel.clear_buffer();
        panel
            .flush()
            .map_err(|err| DisplayError::Flush(format!("{err:?}")))?;
        panel
            .set_display_on(false)
            .map_err(|err| DisplayError::Flush(format!("{err:?}")))
    }
}

pub fn open_display(hardware: &HardwareConfig) -> anyhow::Result<OledPanel> {
    if (hardware.display_width, hardware.display_height) != (128, 64) {
        bail!(
            "unsupported panel size {}x{}, the SSD1306 driver is built for 128x64",
            hardware.display_width,
            hardware.display_height
        );
    }
    Ok(OledPanel {
        bus: hardware.i2c_bus.clone(),
        address: hardware.display_address,
        panel: None,
    })
}
