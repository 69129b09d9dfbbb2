//! Caller input checks.
//!
//! These only look at the *format* of what the user typed. Whether a PIN is
//! the right one is only ever learned from the envelope's authentication tag.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::ValidationError;

/// Number of digits in a PIN.
pub const PIN_LEN: usize = 6;

/// Default maximum secret size in bytes.
pub const DEFAULT_MAX_SECRET_LEN: usize = 1000;

/// A well-formed PIN: exactly [`PIN_LEN`] ASCII digits.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Pin(String);

impl Pin {
    /// Check the format of a PIN. Surrounding whitespace is ignored.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.len() != PIN_LEN || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ValidationError::InvalidPin { expected: PIN_LEN });
        }
        Ok(Self(trimmed.to_string()))
    }

    /// PIN bytes, the key derivation input.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl fmt::Debug for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Pin(..)")
    }
}

/// Reject secrets above `max` bytes.
pub fn check_secret_len(secret: &[u8], max: usize) -> Result<(), ValidationError> {
    if secret.len() > max {
        return Err(ValidationError::SecretTooLong { len: secret.len(), max });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn accepts_six_digits() {
        assert!(Pin::parse("123456").is_ok());
        assert!(Pin::parse("000000").is_ok());
        assert!(Pin::parse(" 987654\n").is_ok());
    }

    #[test]
    fn rejects_wrong_length_or_non_digits() {
        for bad in ["", "12345", "1234567", "12a456", "12 456", "１２３４５６"] {
            assert_eq!(
                Pin::parse(bad),
                Err(ValidationError::InvalidPin { expected: PIN_LEN }),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn secret_length_boundary() {
        assert!(check_secret_len(&[0; 1000], 1000).is_ok());
        assert!(check_secret_len(&[], 1000).is_ok());
        assert_eq!(
            check_secret_len(&[0; 1001], 1000),
            Err(ValidationError::SecretTooLong { len: 1001, max: 1000 })
        );
    }

    #[test]
    fn pin_debug_is_redacted() {
        let pin = Pin::parse("123456").unwrap();
        assert_eq!(format!("{pin:?}"), "Pin(..)");
    }

    proptest! {
        /// Property: any six-digit string is a valid PIN
        #[test]
        fn prop_six_digits_always_valid(pin in "[0-9]{6}") {
            prop_assert!(Pin::parse(&pin).is_ok());
        }
    }
}
