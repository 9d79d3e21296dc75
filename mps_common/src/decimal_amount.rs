//! Serde adapter for amounts exchanged with the payment gateway and web clients as decimals.
//!
//! Amounts are written as strings with two decimal places (`"1500.00"`), and read from either a decimal string or a
//! JSON number.
//!
//! ```rust,ignore
//! #[derive(Serialize, Deserialize)]
//! struct Claim {
//!     #[serde(with = "mps_common::decimal_amount")]
//!     amount: Cents,
//! }
//! ```
use std::{fmt, str::FromStr};

use serde::{
    de::{self, Visitor},
    Deserializer,
    Serializer,
};

use crate::Cents;

pub fn serialize<S: Serializer>(value: &Cents, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cents, D::Error> {
    deserializer.deserialize_any(DecimalAmountVisitor)
}

struct DecimalAmountVisitor;

impl<'de> Visitor<'de> for DecimalAmountVisitor {
    type Value = Cents;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a decimal amount as a string or number")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Cents::from_str(v).map_err(E::custom)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        Cents::try_from(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        v.checked_mul(100).map(Cents::from).ok_or_else(|| E::custom(format!("{v} is out of range")))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v).map_err(E::custom).and_then(|v| self.visit_i64(v))
    }
}

/// The same encoding for `Option<Cents>` fields. `None` is written as `null`.
pub mod optional {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::Cents;

    pub fn serialize<S: Serializer>(value: &Option<Cents>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => super::serialize(v, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Cents>, D::Error> {
        #[derive(Deserialize)]
        struct Wrapper(#[serde(with = "crate::decimal_amount")] Cents);
        let v = Option::<Wrapper>::deserialize(deserializer)?;
        Ok(v.map(|Wrapper(c)| c))
    }
}
