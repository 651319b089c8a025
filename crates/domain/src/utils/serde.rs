//! Serialization helpers for wire and configuration payloads
//!
//! The service is not consistent about numeric fields: the same value can
//! arrive as a JSON number or as a numeric string. The `lenient_*` modules
//! accept both.

use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serializer};

/// A JSON number or a string holding one.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Number(u64),
    Text(String),
}

fn lenient_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::Number(value) => Ok(value),
        NumberOrString::Text(text) => text
            .trim()
            .parse::<u64>()
            .map_err(|e| D::Error::custom(format!("expected a number, got {text:?}: {e}"))),
    }
}

/// Serialize a Duration as milliseconds (u64)
///
/// # Usage
/// ```rust
/// use std::time::Duration;
///
/// use nimbus_domain::utils::serde::duration_millis;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Example {
///     #[serde(with = "duration_millis")]
///     timeout: Duration,
/// }
/// ```
pub mod duration_millis {
    use super::*;

    type SerializeResult<S> = Result<<S as Serializer>::Ok, <S as Serializer>::Error>;

    /// Writes the duration as whole milliseconds.
    pub fn serialize<S>(duration: &Duration, serializer: S) -> SerializeResult<S>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    /// Accepts milliseconds as a number or a numeric string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        lenient_u64(deserializer).map(Duration::from_millis)
    }
}

/// `u32` that may arrive as a JSON number or a numeric string.
pub mod lenient_u32 {
    use super::*;

    /// Writes a plain number.
    pub fn serialize<S>(value: &u32, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u32(*value)
    }

    /// Accepts a number or a numeric string.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = lenient_u64(deserializer)?;
        u32::try_from(value).map_err(|_| D::Error::custom(format!("{value} does not fit in u32")))
    }
}
