//! # Sensor Module
//!
//! Hardware temperature reading and startup calibration for the sensor node.
//!
//! This module handles:
//! - Reading raw temperatures from an ADC channel or a Linux thermal zone
//! - Computing a calibration offset against a reference temperature
//! - Turning a raw measurement into a calibrated [`Reading`]

pub mod calibration;
pub mod source;

pub use calibration::CalibrationOffset;
pub use source::{build_sensor, AdcTemperatureSensor, TemperatureSensor, ThermalZoneSensor};

/// Convert Celsius to Fahrenheit
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 9.0 / 5.0 + 32.0
}

/// Convert Fahrenheit to Celsius
pub fn fahrenheit_to_celsius(fahrenheit: f64) -> f64 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// One calibrated temperature reading, valid for a single send cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub celsius: f64,
    pub fahrenheit: f64,
}

impl Reading {
    /// Apply the calibration offset to a raw Celsius measurement
    ///
    /// The offset lives in the Fahrenheit domain: the measurement is
    /// converted to Fahrenheit, shifted, and converted back.
    ///
    /// # Examples
    ///
    /// ```
    /// use thermolink::sensor::{CalibrationOffset, Reading};
    ///
    /// let reading = Reading::from_measurement(20.0, CalibrationOffset::manual(4.5));
    /// assert!((reading.fahrenheit - 72.5).abs() < 1e-9);
    /// assert!((reading.celsius - 22.5).abs() < 1e-9);
    /// ```
    pub fn from_measurement(raw_celsius: f64, offset: CalibrationOffset) -> Self {
        let fahrenheit = celsius_to_fahrenheit(raw_celsius) + offset.fahrenheit();
        Self {
            celsius: fahrenheit_to_celsius(fahrenheit),
            fahrenheit,
        }
    }
}

impl std::fmt::Display for Reading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}C {:.2}F", self.celsius, self.fahrenheit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_conversions() {
        assert!((celsius_to_fahrenheit(0.0) - 32.0).abs() < 1e-9);
        assert!((celsius_to_fahrenheit(100.0) - 212.0).abs() < 1e-9);
        assert!((fahrenheit_to_celsius(-40.0) - (-40.0)).abs() < 1e-9);
        assert!((fahrenheit_to_celsius(98.6) - 37.0).abs() < 1e-9);
    }

    #[test]
    fn test_reading_without_offset() {
        let reading = Reading::from_measurement(22.5, CalibrationOffset::manual(0.0));
        assert!((reading.celsius - 22.5).abs() < 1e-9);
        assert!((reading.fahrenheit - 72.5).abs() < 1e-9);
    }

    #[test]
    fn test_negative_offset() {
        let reading = Reading::from_measurement(30.0, CalibrationOffset::manual(-9.0));
        assert!((reading.fahrenheit - 77.0).abs() < 1e-9);
        assert!((reading.celsius - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_reading_display() {
        let reading = Reading::from_measurement(22.5, CalibrationOffset::manual(0.0));
        assert_eq!(reading.to_string(), "22.50C 72.50F");
    }
}
