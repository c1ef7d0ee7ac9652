//! Helpers for parsing and converting linear and dB gain values.

use serde::de::{Error as DeError, Visitor};
use serde::Deserializer;
use std::fmt;

/// Convert a dB value to linear gain.
pub fn db_to_linear(db: f64) -> f64 {
    10.0_f64.powf(db / 20.0)
}

/// Convert a linear gain to dB.
pub fn linear_to_db(value: f64) -> f64 {
    let v = value.max(f64::MIN_POSITIVE);
    20.0 * v.log10()
}

/// Deserialize a dB value written either as a number or a string like `"-3db"`.
pub fn deserialize_db<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    struct DbVisitor;

    impl<'de> Visitor<'de> for DbVisitor {
        type Value = f64;

        fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
            formatter.write_str("a number or a string like \"-3db\"")
        }

        fn visit_f64<E>(self, value: f64) -> Result<Self::Value, E>
        where
            E: DeError,
        {
            Ok(value)
        }

        fn visit_i64<E>(self, value: i64) -> Result<Self::Value, E>
        where
            E: DeError,
        {
            Ok(value as f64)
        }

        fn visit_u64<E>(self, value: u64) -> Result<Self::Value, E>
        where
            E: DeError,
        {
            Ok(value as f64)
        }

        fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
        where
            E: DeError,
        {
            parse_db(value)
                .ok_or_else(|| DeError::custom(format!("invalid gain value \"{}\"", value)))
        }
    }

    deserializer.deserialize_any(DbVisitor)
}

fn parse_db(value: &str) -> Option<f64> {
    let lower = value.trim().to_ascii_lowercase();
    let number = lower.strip_suffix("db").unwrap_or(&lower);
    number.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(serde::Deserialize)]
    struct Preamp {
        #[serde(deserialize_with = "deserialize_db")]
        value: f64,
    }

    #[test]
    fn db_conversions_round_trip_known_points() {
        assert!((db_to_linear(0.0) - 1.0).abs() < 1e-12);
        assert!((db_to_linear(-6.0) - 0.501_187).abs() < 1e-5);
        assert!((linear_to_db(0.5) + 6.020_6).abs() < 1e-3);
    }

    #[test]
    fn db_accepts_numbers_and_suffixed_strings() {
        let parsed: Preamp = serde_json::from_str(r#"{"value": "-3.5 dB"}"#).unwrap();
        assert_eq!(parsed.value, -3.5);
        let parsed: Preamp = serde_json::from_str(r#"{"value": 2}"#).unwrap();
        assert_eq!(parsed.value, 2.0);
        assert!(serde_json::from_str::<Preamp>(r#"{"value": "loud"}"#).is_err());
    }
}
