//! Transaction types for Ledgerline
//!
//! Transactions are accepted exactly as the client supplies them: there is
//! no signature, no fee, no uniqueness constraint and no check that the
//! sender can afford the amount.

use serde::{Deserialize, Serialize, Serializer};

/// Externally supplied user identifier. Not reserved or validated.
pub type UserId = String;

/// JSON clients switch to exponent notation for integral values from here on.
const EXPONENT_THRESHOLD: f64 = 1e21;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: UserId,
    pub recipient: UserId,
    #[serde(serialize_with = "serialize_amount")]
    pub amount: f64,
}

impl Transaction {
    pub fn new(sender: impl Into<UserId>, recipient: impl Into<UserId>, amount: f64) -> Self {
        Self {
            sender: sender.into(),
            recipient: recipient.into(),
            amount,
        }
    }
}

/// Write integral amounts without a fractional part (`40`, not `40.0`), the
/// way JSON clients emit them. The digest of a block depends on this form.
pub fn serialize_amount<S: Serializer>(amount: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if amount.is_finite() && amount.fract() == 0.0 && amount.abs() < EXPONENT_THRESHOLD {
        // `Display` gives the shortest round-trip digits padded with zeros,
        // which is also what clients print above 2^53.
        if let Ok(digits) = amount.to_string().parse::<i128>() {
            return serializer.serialize_i128(digits);
        }
    }
    serializer.serialize_f64(*amount)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integral_amount_has_no_fraction() {
        let tx = Transaction::new("alice", "bob", 40.0);
        let json = serde_json::to_string(&tx).unwrap();
        assert_eq!(json, r#"{"sender":"alice","recipient":"bob","amount":40}"#);
    }

    #[test]
    fn test_fractional_amount_is_preserved() {
        let tx = Transaction::new("alice", "bob", 12.5);
        let json = serde_json::to_string(&tx).unwrap();
        assert_eq!(json, r#"{"sender":"alice","recipient":"bob","amount":12.5}"#);
    }

    #[test]
    fn test_accepts_integer_and_float_amounts() {
        let tx: Transaction =
            serde_json::from_str(r#"{"sender":"a","recipient":"b","amount":7}"#).unwrap();
        assert_eq!(tx.amount, 7.0);

        let tx: Transaction =
            serde_json::from_str(r#"{"sender":"a","recipient":"b","amount":-0.25}"#).unwrap();
        assert_eq!(tx.amount, -0.25);
    }

    #[test]
    fn test_large_integral_amounts_stay_plain_digits() {
        let json = serde_json::to_string(&Transaction::new("a", "b", 1e20)).unwrap();
        assert_eq!(json, r#"{"sender":"a","recipient":"b","amount":100000000000000000000}"#);

        let json = serde_json::to_string(&Transaction::new("a", "b", 123456789012345680000.0)).unwrap();
        assert_eq!(json, r#"{"sender":"a","recipient":"b","amount":123456789012345680000}"#);

        let json = serde_json::to_string(&Transaction::new("a", "b", -9007199254740993.0)).unwrap();
        assert_eq!(json, r#"{"sender":"a","recipient":"b","amount":-9007199254740992}"#);
    }

    #[test]
    fn test_amounts_from_1e21_use_exponent_form() {
        let json = serde_json::to_string(&Transaction::new("a", "b", 1e21)).unwrap();
        assert!(json.starts_with(r#"{"sender":"a","recipient":"b","amount":1e"#), "{}", json);
        assert!(json.ends_with("21}"), "{}", json);

        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.amount, 1e21);
    }

    #[test]
    fn test_negative_zero_is_written_as_zero() {
        let json = serde_json::to_string(&Transaction::new("a", "b", -0.0)).unwrap();
        assert_eq!(json, r#"{"sender":"a","recipient":"b","amount":0}"#);
    }
}
