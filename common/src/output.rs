use crate::{config::Polarity, error::HardwareError, ports::DigitalOutput};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

pub struct OutputController<O> {
    pin: O,
    polarity: Polarity,
}

impl<O: DigitalOutput> OutputController<O> {
    pub fn new(pin: O, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }

    pub fn physical_level(&self, active: bool) -> Level {
        match (self.polarity, active) {
            (Polarity::ActiveHigh, true) | (Polarity::ActiveLow, false) => Level::High,
            (Polarity::ActiveHigh, false) | (Polarity::ActiveLow, true) => Level::Low,
        }
    }

    pub fn set_level(&mut self, active: bool) -> Result<(), HardwareError> {
        let level = self.physical_level(active);
        self.pin.write(level)
    }

    pub fn release(&mut self) -> Result<(), HardwareError> {
        self.pin.release()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        writes: Vec<Level>,
        fail: bool,
    }

    impl DigitalOutput for Recorder {
        fn write(&mut self, level: Level) -> Result<(), HardwareError> {
            if self.fail {
                return Err(HardwareError::Write("stuck".to_string()));
            }
            self.writes.push(level);
            Ok(())
        }
    }

    #[test]
    fn active_high_maps_directly() {
        let mut output = OutputController::new(Recorder::default(), Polarity::ActiveHigh);
        output.set_level(true).unwrap();
        output.set_level(false).unwrap();
        assert_eq!(output.pin.writes, vec![Level::High, Level::Low]);
    }

    #[test]
    fn active_low_inverts() {
        let mut output = OutputController::new(Recorder::default(), Polarity::ActiveLow);
        output.set_level(true).unwrap();
        output.set_level(false).unwrap();
        assert_eq!(output.pin.writes, vec![Level::Low, Level::High]);
    }

    #[test]
    fn write_failure_propagates() {
        let mut output = OutputController::new(
            Recorder {
                fail: true,
                ..Recorder::default()
            },
            Polarity::ActiveHigh,
        );
        assert_eq!(
            output.set_level(true),
            Err(HardwareError::Write("stuck".to_string()))
        );
    }
}
