use std::path::PathBuf;

use fanctl_common::{sensor::parse_millidegrees, SensorError, TemperatureSource};

/// CPU temperature from a sysfs thermal zone (`.../thermal_zoneN/temp`).
pub struct SysfsThermal {
    path: PathBuf,
}

impl SysfsThermal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TemperatureSource for SysfsThermal {
    fn read_millidegrees(&mut self) -> Result<i64, SensorError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| SensorError::Io {
            path: self.path.display().to_string(),
            source,
        })?;
        parse_millidegrees(&raw)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn reads_thermal_zone_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "51234").unwrap();

        let mut source = SysfsThermal::new(file.path());
        assert_eq!(source.read_millidegrees().unwrap(), 51_234);
    }

    #[test]
    fn missing_zone_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut source = SysfsThermal::new(dir.path().join("thermal_zone9/temp"));
        assert!(matches!(
            source.read_millidegrees(),
            Err(SensorError::Io { .. })
        ));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "hot").unwrap();

        let mut source = SysfsThermal::new(file.path());
        assert!(matches!(
            source.read_millidegrees(),
            Err(SensorError::Parse { .. })
        ));
    }
}
