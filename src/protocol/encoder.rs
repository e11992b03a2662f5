//! # Frame Encoder
//!
//! Serializes protocol messages into newline-terminated frames.

use serde::Serialize;

use crate::error::Result;

/// Frame terminator
pub const FRAME_DELIMITER: u8 = b'\n';

/// Encode a message as one frame
///
/// Produces compact JSON followed by a single `\n`. Serde JSON never emits a
/// raw newline inside a document, so the delimiter is unambiguous.
///
/// # Examples
///
/// ```
/// use thermolink::protocol::encoder::encode_frame;
/// use thermolink::protocol::messages::Payload;
///
/// let frame = encode_frame(&Payload::new(22.5, 72.5)).unwrap();
/// assert_eq!(frame, b"{\"celsius\":22.5,\"fahrenheit\":72.5}\n");
/// ```
pub fn encode_frame<T: Serialize>(message: &T) -> Result<Vec<u8>> {
    let mut frame = serde_json::to_vec(message)?;
    frame.push(FRAME_DELIMITER);
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{Acknowledgement, Payload};

    #[test]
    fn test_frame_has_single_trailing_delimiter() {
        let frame = encode_frame(&Payload::new(-3.25, 26.15)).unwrap();
        assert_eq!(frame.last(), Some(&FRAME_DELIMITER));
        assert_eq!(frame.iter().filter(|&&b| b == FRAME_DELIMITER).count(), 1);
    }

    #[test]
    fn test_encode_error_ack() {
        let frame = encode_frame(&Acknowledgement::invalid_json()).unwrap();
        assert_eq!(frame, b"{\"status\":\"error\",\"reason\":\"invalid_json\"}\n".to_vec());
    }

    #[test]
    fn test_embedded_newline_is_escaped() {
        let frame = encode_frame(&serde_json::json!({ "note": "a\nb" })).unwrap();
        assert_eq!(frame.iter().filter(|&&b| b == FRAME_DELIMITER).count(), 1);
    }
}
