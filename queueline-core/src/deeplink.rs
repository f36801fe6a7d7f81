//! Display-page deep links.
//!
//! The viewer's link carries the queue name and ticket number as two
//! separately obfuscated query parameters (`queue`, `number`): each
//! value is XOR-folded with a single fixed byte and URL-safe Base64
//! encoded. This is capability hiding, not cryptography -- anyone who
//! holds the link may watch the queue, which is the intended access
//! model for the display page.

use crate::{Result, TicketingError};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

const XOR_KEY: u8 = 0x5a;

/// Decoded display-link payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLink {
    pub queue_name: String,
    pub number: u64,
}

/// Obfuscate one parameter value for URL transport.
pub fn encode_param(value: &str) -> String {
    let folded: Vec<u8> = value.bytes().map(|b| b ^ XOR_KEY).collect();
    URL_SAFE_NO_PAD.encode(folded)
}

/// Reverse [`encode_param`]; fails on tampered or non-UTF-8 input.
pub fn decode_param(encoded: &str) -> Result<String> {
    let folded = URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|e| TicketingError::Validation(format!("Malformed display link: {}", e)))?;
    let bytes: Vec<u8> = folded.into_iter().map(|b| b ^ XOR_KEY).collect();
    String::from_utf8(bytes)
        .map_err(|_| TicketingError::Validation("Malformed display link".to_string()))
}

/// Produce the `queue` and `number` parameter values for a viewer link.
pub fn encode_link(queue_name: &str, number: u64) -> (String, String) {
    (
        encode_param(queue_name),
        encode_param(&number.to_string()),
    )
}

/// Decode the two link parameters back into queue name and number.
pub fn decode_link(queue_param: &str, number_param: &str) -> Result<DisplayLink> {
    let queue_name = decode_param(queue_param)?;
    let number = decode_param(number_param)?
        .parse::<u64>()
        .map_err(|_| TicketingError::Validation("Malformed display link".to_string()))?;
    Ok(DisplayLink { queue_name, number })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_round_trip() {
        let (q, n) = encode_link("Clinic-A", 42);
        let decoded = decode_link(&q, &n).unwrap();
        assert_eq!(decoded.queue_name, "Clinic-A");
        assert_eq!(decoded.number, 42);
    }

    #[test]
    fn params_are_not_plaintext() {
        let (q, n) = encode_link("Clinic-A", 7);
        assert!(!q.contains("Clinic"));
        assert_ne!(n, "7");
    }

    #[test]
    fn tampered_params_are_rejected() {
        assert!(decode_param("not base64 !!").is_err());

        // Valid base64 that decodes to a non-numeric ticket number
        let (q, _) = encode_link("Clinic-A", 1);
        let bogus_number = encode_param("not-a-number");
        assert!(decode_link(&q, &bogus_number).is_err());
    }
}
