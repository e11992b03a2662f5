//! # Calibration Module
//!
//! Computes the offset that brings the sensor in line with a known reference.
//!
//! The offset is computed once at startup, in the Fahrenheit domain, and is
//! read-only afterwards:
//!
//! `offset = target_f - mean(samples)`
//!
//! When no reference is configured the manual offset is used unchanged.

use std::time::Duration;
use tracing::{debug, info};

use super::celsius_to_fahrenheit;
use super::source::TemperatureSensor;
use crate::config::CalibrationConfig;
use crate::error::{Result, TelemetryError};

/// Fahrenheit offset added to every raw measurement
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CalibrationOffset {
    fahrenheit: f64,
}

impl CalibrationOffset {
    /// Use a manually configured offset
    #[must_use]
    pub fn manual(fahrenheit: f64) -> Self {
        Self { fahrenheit }
    }

    /// Returns the offset in degrees Fahrenheit.
    #[must_use]
    pub fn fahrenheit(&self) -> f64 {
        self.fahrenheit
    }

    /// Average `samples` readings spaced by `delay` and compare to `target_f`
    ///
    /// # Errors
    ///
    /// Any failed read aborts calibration; the caller treats this as fatal.
    pub async fn from_reference<S: TemperatureSensor + ?Sized>(
        sensor: &mut S,
        target_f: f64,
        samples: u32,
        delay: Duration,
    ) -> Result<Self> {
        if samples == 0 {
            return Err(TelemetryError::Sensor(
                "calibration needs at least one sample".to_string(),
            ));
        }

        let mut sum = 0.0;
        for i in 0..samples {
            let sample_f = celsius_to_fahrenheit(sensor.read_celsius()?);
            debug!("Calibration sample {}/{}: {:.2}F", i + 1, samples, sample_f);
            sum += sample_f;
            tokio::time::sleep(delay).await;
        }

        let measured_avg = sum / samples as f64;
        let offset = Self::manual(target_f - measured_avg);
        info!(
            "Calibrated against {:.2}F: measured average {:.2}F, offset {:.2}F",
            target_f, measured_avg, offset.fahrenheit
        );
        Ok(offset)
    }

    /// Resolve the offset from configuration
    ///
    /// Samples the sensor only when a reference temperature is configured.
    pub async fn from_config<S: TemperatureSensor + ?Sized>(
        sensor: &mut S,
        config: &CalibrationConfig,
    ) -> Result<Self> {
        match config.target_f {
            Some(target_f) => {
                Self::from_reference(sensor, target_f, config.samples, config.sample_delay()).await
            }
            None => Ok(Self::manual(config.manual_offset_f)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensor::source::MockTemperatureSensor;

    #[tokio::test]
    async fn test_offset_from_constant_readings() {
        let mut sensor = MockTemperatureSensor::new();
        // 25C == 77F
        sensor.expect_read_celsius().times(20).returning(|| Ok(25.0));

        let offset = CalibrationOffset::from_reference(&mut sensor, 80.0, 20, Duration::ZERO)
            .await
            .unwrap();
        assert!((offset.fahrenheit() - 3.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_offset_averages_samples() {
        let mut sensor = MockTemperatureSensor::new();
        let mut values = vec![20.0, 30.0].into_iter();
        sensor
            .expect_read_celsius()
            .times(2)
            .returning(move || Ok(values.next().unwrap()));

        // Average of 68F and 86F is 77F
        let offset = CalibrationOffset::from_reference(&mut sensor, 77.0, 2, Duration::ZERO)
            .await
            .unwrap();
        assert!(offset.fahrenheit().abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_read_failure_is_fatal() {
        let mut sensor = MockTemperatureSensor::new();
        sensor
            .expect_read_celsius()
            .times(1)
            .returning(|| Err(TelemetryError::Sensor("ADC unavailable".to_string())));

        let result = CalibrationOffset::from_reference(&mut sensor, 80.0, 20, Duration::ZERO).await;
        assert!(matches!(result, Err(TelemetryError::Sensor(_))));
    }

    #[tokio::test]
    async fn test_zero_samples_rejected() {
        let mut sensor = MockTemperatureSensor::new();
        sensor.expect_read_celsius().never();

        let result = CalibrationOffset::from_reference(&mut sensor, 80.0, 0, Duration::ZERO).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_manual_offset_skips_sampling() {
        let mut sensor = MockTemperatureSensor::new();
        sensor.expect_read_celsius().never();

        let config = CalibrationConfig {
            target_f: None,
            manual_offset_f: -1.5,
            samples: 20,
            sample_delay_ms: 50,
        };
        let offset = CalibrationOffset::from_config(&mut sensor, &config).await.unwrap();
        assert_eq!(offset, CalibrationOffset::manual(-1.5));
    }

    #[tokio::test]
    async fn test_reference_offset_from_config() {
        let mut sensor = MockTemperatureSensor::new();
        sensor.expect_read_celsius().times(3).returning(|| Ok(0.0));

        let config = CalibrationConfig {
            target_f: Some(33.0),
            manual_offset_f: 99.0,
            samples: 3,
            sample_delay_ms: 0,
        };
        let offset = CalibrationOffset::from_config(&mut sensor, &config).await.unwrap();
        assert!((offset.fahrenheit() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_default_offset_is_zero() {
        assert_eq!(CalibrationOffset::default().fahrenheit(), 0.0);
    }
}
