//! # Thermolink Library
//!
//! Temperature telemetry over a newline-delimited JSON TCP protocol.
//!
//! This library provides both ends of the link: a sensor node that measures,
//! calibrates and sends readings over a reconnecting connection, and a server
//! that accepts many nodes concurrently, acknowledges every frame and appends
//! each reading to a shared log.

pub mod config;
pub mod error;
pub mod protocol;
pub mod sensor;
pub mod node;
pub mod server;
pub mod telemetry;
