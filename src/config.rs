//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! One file serves both processes: the server reads `[server]`, the sensor
//! node reads `[node]`, `[calibration]` and `[sensor]`. Missing sections fall
//! back to their defaults.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, TelemetryError};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
}

/// Telemetry server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_server_log_file")]
    pub log_file: String,

    /// CSV mirror of every received reading; empty disables it
    #[serde(default)]
    pub csv_file: String,
}

/// Sensor node (client) configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    #[serde(default = "default_node_server_host")]
    pub server_host: String,

    #[serde(default = "default_port")]
    pub server_port: u16,

    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,

    #[serde(default = "default_send_interval_ms")]
    pub send_interval_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_node_log_file")]
    pub log_file: String,
}

/// Startup calibration configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CalibrationConfig {
    /// Reference temperature in Fahrenheit (e.g. a thermostat reading).
    /// When absent, `manual_offset_f` is used as-is.
    #[serde(default)]
    pub target_f: Option<f64>,

    #[serde(default)]
    pub manual_offset_f: f64,

    #[serde(default = "default_samples")]
    pub samples: u32,

    #[serde(default = "default_sample_delay_ms")]
    pub sample_delay_ms: u64,
}

/// Kind of hardware reading source
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    /// Raw ADC count from the onboard temperature diode
    Adc,
    /// Linux thermal zone, millidegrees Celsius
    ThermalZone,
}

/// Hardware reading source configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SensorConfig {
    #[serde(default = "default_sensor_kind")]
    pub kind: SensorKind,

    #[serde(default = "default_sensor_path")]
    pub path: String,

    #[serde(default = "default_vref")]
    pub vref: f64,

    #[serde(default = "default_adc_max")]
    pub adc_max: u32,
}

// Default value functions
fn default_server_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 5005 }
fn default_server_log_file() -> String { "pico_temps.log".to_string() }

fn default_node_server_host() -> String { "127.0.0.1".to_string() }
fn default_connect_timeout_ms() -> u64 { 5000 }
fn default_ack_timeout_ms() -> u64 { 2000 }
fn default_send_interval_ms() -> u64 { 1000 }
fn default_reconnect_interval_ms() -> u64 { 1000 }
fn default_node_log_file() -> String { "pico_log.txt".to_string() }

fn default_samples() -> u32 { 20 }
fn default_sample_delay_ms() -> u64 { 50 }

fn default_sensor_kind() -> SensorKind { SensorKind::ThermalZone }
fn default_sensor_path() -> String { "/sys/class/thermal/thermal_zone0/temp".to_string() }
fn default_vref() -> f64 { 3.3 }
fn default_adc_max() -> u32 { 65535 }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_server_host(),
            port: default_port(),
            log_file: default_server_log_file(),
            csv_file: String::new(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            server_host: default_node_server_host(),
            server_port: default_port(),
            connect_timeout_ms: default_connect_timeout_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            send_interval_ms: default_send_interval_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            log_file: default_node_log_file(),
        }
    }
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            target_f: None,
            manual_offset_f: 0.0,
            samples: default_samples(),
            sample_delay_ms: default_sample_delay_ms(),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: default_sensor_kind(),
            path: default_sensor_path(),
            vref: default_vref(),
            adc_max: default_adc_max(),
        }
    }
}

impl ServerConfig {
    /// Address string the listener binds to, e.g. `0.0.0.0:5005`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// CSV mirror path, if enabled
    pub fn csv_path(&self) -> Option<PathBuf> {
        if self.csv_file.is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.csv_file))
        }
    }
}

impl NodeConfig {
    /// Address string of the telemetry server, e.g. `10.0.0.161:5005`
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn send_interval(&self) -> Duration {
        Duration::from_millis(self.send_interval_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }
}

impl CalibrationConfig {
    pub fn sample_delay(&self) -> Duration {
        Duration::from_millis(self.sample_delay_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// * `Result<Config>` - Loaded and validated configuration
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use thermolink::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(invalid("server host cannot be empty"));
        }

        if self.server.port == 0 {
            return Err(invalid("server port must be between 1 and 65535"));
        }

        if self.server.log_file.is_empty() {
            return Err(invalid("server log_file cannot be empty"));
        }

        if self.node.server_host.is_empty() {
            return Err(invalid("node server_host cannot be empty"));
        }

        if self.node.server_port == 0 {
            return Err(invalid("node server_port must be between 1 and 65535"));
        }

        if self.node.log_file.is_empty() {
            return Err(invalid("node log_file cannot be empty"));
        }

        // Validate timing fields
        for (name, value) in [
            ("connect_timeout_ms", self.node.connect_timeout_ms),
            ("ack_timeout_ms", self.node.ack_timeout_ms),
            ("send_interval_ms", self.node.send_interval_ms),
            ("reconnect_interval_ms", self.node.reconnect_interval_ms),
        ] {
            if value == 0 || value > 60000 {
                return Err(invalid(format!("{} must be between 1 and 60000", name)));
            }
        }

        if self.calibration.samples == 0 || self.calibration.samples > 1000 {
            return Err(invalid("calibration samples must be between 1 and 1000"));
        }

        if self.calibration.sample_delay_ms > 10000 {
            return Err(invalid("sample_delay_ms must be at most 10000"));
        }

        if let Some(target) = self.calibration.target_f {
            if !target.is_finite() {
                return Err(invalid("calibration target_f must be a finite number"));
            }
        }

        if !self.calibration.manual_offset_f.is_finite() {
            return Err(invalid("manual_offset_f must be a finite number"));
        }

        if self.sensor.path.is_empty() {
            return Err(invalid("sensor path cannot be empty"));
        }

        if self.sensor.kind == SensorKind::Adc {
            if self.sensor.adc_max == 0 {
                return Err(invalid("adc_max must be greater than 0"));
            }

            if !(self.sensor.vref > 0.0 && self.sensor.vref <= 5.0) {
                return Err(invalid("vref must be between 0.0 and 5.0"));
            }
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> TelemetryError {
    TelemetryError::Config(toml::de::Error::custom(msg))
}
