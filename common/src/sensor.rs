use crate::{error::SensorError, ports::TemperatureSource, types::TemperatureSample};

pub struct SensorReader<S> {
    source: S,
}

impl<S: TemperatureSource> SensorReader<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    pub fn read(&mut self, now_ms: u64) -> Result<TemperatureSample, SensorError> {
        let milli = self.source.read_millidegrees()?;
        Ok(TemperatureSample {
            celsius: milli as f64 / 1000.0,
            taken_at_ms: now_ms,
        })
    }
}

/// Parses the contents of a sysfs thermal zone `temp` file.
pub fn parse_millidegrees(raw: &str) -> Result<i64, SensorError> {
    let trimmed = raw.trim();
    trimmed.parse::<i64>().map_err(|_| SensorError::Parse {
        raw: trimmed.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(Result<i64, ()>);

    impl TemperatureSource for Fixed {
        fn read_millidegrees(&mut self) -> Result<i64, SensorError> {
            self.0
                .map_err(|_| SensorError::Unavailable("test".to_string()))
        }
    }

    #[test]
    fn converts_millidegrees() {
        let mut reader = SensorReader::new(Fixed(Ok(47_250)));
        let sample = reader.read(1_234).unwrap();
        assert_eq!(sample.celsius, 47.25);
        assert_eq!(sample.taken_at_ms, 1_234);

        let mut reader = SensorReader::new(Fixed(Ok(23_450)));
        assert_eq!(reader.read(0).unwrap().celsius, 23.45);
    }

    #[test]
    fn failures_surface_as_errors() {
        let mut reader = SensorReader::new(Fixed(Err(())));
        assert!(reader.read(0).is_err());
    }

    #[test]
    fn parses_sysfs_contents() {
        assert_eq!(parse_millidegrees("48312\n").unwrap(), 48_312);
        assert_eq!(parse_millidegrees("-1500").unwrap(), -1_500);
        assert!(matches!(
            parse_millidegrees("garbage"),
            Err(SensorError::Parse { .. })
        ));
        assert!(parse_millidegrees("").is_err());
    }
}
