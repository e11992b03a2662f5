//! Trait abstraction for hardware temperature sources to enable testing

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::config::{SensorConfig, SensorKind};
use crate::error::{Result, TelemetryError};

/// RP2040 temperature diode voltage at 27 °C
const ADC_SENSOR_V27: f64 = 0.706;

/// RP2040 temperature diode slope in volts per °C
const ADC_SENSOR_SLOPE: f64 = 0.001721;

/// Source of raw (uncalibrated) temperature measurements
#[cfg_attr(test, mockall::automock)]
pub trait TemperatureSensor: Send {
    /// Take one measurement in degrees Celsius
    fn read_celsius(&mut self) -> Result<f64>;
}

/// Onboard temperature diode sampled through an ADC channel
///
/// The channel is exposed as a file holding the raw count (e.g. an IIO
/// `in_temp_raw` attribute).
#[derive(Debug, Clone)]
pub struct AdcTemperatureSensor {
    path: PathBuf,
    vref: f64,
    adc_max: u32,
}

impl AdcTemperatureSensor {
    pub fn new<P: AsRef<Path>>(path: P, vref: f64, adc_max: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            vref,
            adc_max,
        }
    }

    /// Convert a raw ADC count to degrees Celsius
    ///
    /// # Examples
    ///
    /// ```
    /// use thermolink::sensor::AdcTemperatureSensor;
    ///
    /// let sensor = AdcTemperatureSensor::new("/dev/null", 3.3, 65535);
    /// // 0.706 V on the diode reads as 27 °C
    /// let raw = (0.706 / 3.3 * 65535.0) as u32;
    /// assert!((sensor.convert(raw) - 27.0).abs() < 0.1);
    /// ```
    pub fn convert(&self, raw: u32) -> f64 {
        let voltage = raw as f64 * self.vref / self.adc_max as f64;
        27.0 - (voltage - ADC_SENSOR_V27) / ADC_SENSOR_SLOPE
    }
}

impl TemperatureSensor for AdcTemperatureSensor {
    fn read_celsius(&mut self) -> Result<f64> {
        let raw: u32 = read_number(&self.path)?;
        if raw > self.adc_max {
            return Err(TelemetryError::Sensor(format!(
                "ADC count {} exceeds adc_max {}",
                raw, self.adc_max
            )));
        }
        let celsius = self.convert(raw);
        debug!("ADC raw {} -> {:.2}C", raw, celsius);
        Ok(celsius)
    }
}

/// Linux thermal zone reporting millidegrees Celsius
#[derive(Debug, Clone)]
pub struct ThermalZoneSensor {
    path: PathBuf,
}

impl ThermalZoneSensor {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl TemperatureSensor for ThermalZoneSensor {
    fn read_celsius(&mut self) -> Result<f64> {
        let millidegrees: i64 = read_number(&self.path)?;
        Ok(millidegrees as f64 / 1000.0)
    }
}

/// Build the configured reading source
pub fn build_sensor(config: &SensorConfig) -> Box<dyn TemperatureSensor> {
    match config.kind {
        SensorKind::Adc => Box::new(AdcTemperatureSensor::new(
            &config.path,
            config.vref,
            config.adc_max,
        )),
        SensorKind::ThermalZone => Box::new(ThermalZoneSensor::new(&config.path)),
    }
}

impl<T: TemperatureSensor + ?Sized> TemperatureSensor for Box<T> {
    fn read_celsius(&mut self) -> Result<f64> {
        (**self).read_celsius()
    }
}

fn read_number<T: std::str::FromStr>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path).map_err(|e| {
        TelemetryError::Sensor(format!("Failed to read {}: {}", path.display(), e))
    })?;
    text.trim().parse().map_err(|_| {
        TelemetryError::Sensor(format!(
            "Unexpected value {:?} in {}",
            text.trim(),
            path.display()
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn value_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_adc_conversion_reference_point() {
        let sensor = AdcTemperatureSensor::new("/unused", 3.3, 65535);
        let raw = (ADC_SENSOR_V27 / 3.3 * 65535.0).round() as u32;
        assert!((sensor.convert(raw) - 27.0).abs() < 0.05);
    }

    #[test]
    fn test_adc_conversion_is_inverse_to_voltage() {
        let sensor = AdcTemperatureSensor::new("/unused", 3.3, 65535);
        // Higher diode voltage means colder
        assert!(sensor.convert(15000) < sensor.convert(14000));
    }

    #[test]
    fn test_adc_reads_raw_file() {
        let file = value_file("14021\n");
        let mut sensor = AdcTemperatureSensor::new(file.path(), 3.3, 65535);
        let celsius = sensor.read_celsius().unwrap();
        assert!((celsius - sensor.convert(14021)).abs() < 1e-9);
    }

    #[test]
    fn test_adc_rejects_out_of_range_count() {
        let file = value_file("5000");
        let mut sensor = AdcTemperatureSensor::new(file.path(), 3.3, 4095);
        assert!(matches!(sensor.read_celsius(), Err(TelemetryError::Sensor(_))));
    }

    #[test]
    fn test_thermal_zone_millidegrees() {
        let file = value_file("42500\n");
        let mut sensor = ThermalZoneSensor::new(file.path());
        assert!((sensor.read_celsius().unwrap() - 42.5).abs() < 1e-9);
    }

    #[test]
    fn test_missing_file_is_sensor_error() {
        let mut sensor = ThermalZoneSensor::new("/nonexistent/thermal_zone0/temp");
        match sensor.read_celsius() {
            Err(TelemetryError::Sensor(msg)) => {
                assert!(msg.contains("/nonexistent/thermal_zone0/temp"));
            }
            other => panic!("Expected Sensor error, got: {:?}", other),
        }
    }

    #[test]
    fn test_garbage_contents_is_sensor_error() {
        let file = value_file("warm");
        let mut sensor = ThermalZoneSensor::new(file.path());
        assert!(matches!(sensor.read_celsius(), Err(TelemetryError::Sensor(_))));
    }

    #[test]
    fn test_build_sensor_from_config() {
        let file = value_file("21000");
        let config = SensorConfig {
            kind: SensorKind::ThermalZone,
            path: file.path().to_string_lossy().to_string(),
            vref: 3.3,
            adc_max: 65535,
        };
        let mut sensor = build_sensor(&config);
        assert!((sensor.read_celsius().unwrap() - 21.0).abs() < 1e-9);
    }
}
