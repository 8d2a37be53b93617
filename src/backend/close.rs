//! Validation of close directives received from the backend.
//!
//! RFC 6455 §7.4: application close codes live in [1000, 4999], a handful of
//! codes are reserved for the protocol itself, and the close reason must fit
//! the 123 bytes left in a control frame after the status code.

use crate::error::BridgeError;

/// Codes that must never be sent in a close frame.
const RESERVED_CLOSE_CODES: [u16; 4] = [1004, 1005, 1006, 1015];

/// Maximum close reason length in bytes.
const MAX_CLOSE_REASON_LEN: usize = 123;

/// Parses a `ws-close-code` header value. An empty value means the default
/// normal closure code 1000.
pub fn parse_close_code(value: &str) -> Result<u16, BridgeError> {
    if value.is_empty() {
        return Ok(1000);
    }

    let code: u16 = value
        .parse()
        .map_err(|_| BridgeError::InvalidCloseDirective(format!("close code {value:?} is not a number")))?;

    if !(1000..=4999).contains(&code) {
        return Err(BridgeError::InvalidCloseDirective(format!(
            "close code {code} must be between 1000 and 4999"
        )));
    }

    if RESERVED_CLOSE_CODES.contains(&code) {
        return Err(BridgeError::InvalidCloseDirective(format!(
            "close code {code} is reserved and must not be sent"
        )));
    }

    Ok(code)
}

/// Parses a `ws-close-reason` header value.
pub fn parse_close_reason(value: &str) -> Result<String, BridgeError> {
    if value.len() > MAX_CLOSE_REASON_LEN {
        return Err(BridgeError::InvalidCloseDirective(format!(
            "close reason must be at most {MAX_CLOSE_REASON_LEN} bytes"
        )));
    }

    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_close_code_defaults_to_normal_closure() {
        assert_eq!(parse_close_code("").unwrap(), 1000);
    }

    #[test]
    fn accepts_codes_in_range() {
        assert_eq!(parse_close_code("1001").unwrap(), 1001);
        assert_eq!(parse_close_code("4000").unwrap(), 4000);
        assert_eq!(parse_close_code("4999").unwrap(), 4999);
    }

    #[test]
    fn rejects_codes_out_of_range() {
        assert!(parse_close_code("999").is_err());
        assert!(parse_close_code("5000").is_err());
    }

    #[test]
    fn rejects_reserved_codes() {
        for code in ["1004", "1005", "1006", "1015"] {
            assert!(parse_close_code(code).is_err(), "code {code} should be rejected");
        }
    }

    #[test]
    fn rejects_non_numeric_codes() {
        assert!(parse_close_code("A").is_err());
        assert!(parse_close_code("10o0").is_err());
    }

    #[test]
    fn accepts_reasons_up_to_the_limit() {
        assert_eq!(parse_close_reason("").unwrap(), "");
        assert_eq!(parse_close_reason("test").unwrap(), "test");
        assert!(parse_close_reason(&"a".repeat(123)).is_ok());
    }

    #[test]
    fn rejects_reasons_over_the_limit() {
        assert!(parse_close_reason(&"a".repeat(124)).is_err());
    }
}
