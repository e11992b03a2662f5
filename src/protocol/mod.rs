//! # Wire Protocol Module
//!
//! Newline-delimited JSON protocol spoken between sensor node and server.
//!
//! This module handles:
//! - Reading payloads and acknowledgement message types
//! - Encoding a message into one `\n`-terminated frame
//! - Reassembling frames from a TCP byte stream
//! - Classifying frame contents (empty, JSON, invalid)

pub mod messages;
pub mod encoder;
pub mod decoder;
