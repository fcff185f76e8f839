//! Wait bounds for prompt matching.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

/// How long to wait for a prompt before giving up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Give up after this (non-zero) duration.
    After(Duration),
    /// Block until a match, end of stream or fault.
    Never,
}

impl Timeout {
    /// Timeout of whole seconds.
    pub const fn secs(secs: u64) -> Self {
        Timeout::After(Duration::from_secs(secs))
    }

    /// Timeout of milliseconds.
    pub const fn millis(millis: u64) -> Self {
        Timeout::After(Duration::from_millis(millis))
    }

    /// The bound, if any.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Timeout::After(d) => Some(*d),
            Timeout::Never => None,
        }
    }
}

impl fmt::Display for Timeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Timeout::After(d) => write!(f, "{} seconds", d.as_secs_f64()),
            Timeout::Never => write!(f, "no timeout"),
        }
    }
}

/// TOML form: a positive number of seconds, or the string "none".
#[derive(Deserialize)]
#[serde(untagged)]
enum TimeoutRepr {
    Secs(f64),
    Word(String),
}

impl<'de> Deserialize<'de> for Timeout {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error;

        match TimeoutRepr::deserialize(deserializer)? {
            TimeoutRepr::Secs(secs) if secs > 0.0 && secs.is_finite() => {
                Ok(Timeout::After(Duration::from_secs_f64(secs)))
            }
            TimeoutRepr::Secs(secs) => Err(D::Error::custom(format!(
                "timeout must be a positive number of seconds, got {}",
                secs
            ))),
            TimeoutRepr::Word(word) if word.eq_ignore_ascii_case("none") => Ok(Timeout::Never),
            TimeoutRepr::Word(word) => Err(D::Error::custom(format!(
                "invalid timeout '{}': use a number of seconds or \"none\"",
                word
            ))),
        }
    }
}

impl Serialize for Timeout {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Timeout::After(d) => serializer.serialize_f64(d.as_secs_f64()),
            Timeout::Never => serializer.serialize_str("none"),
        }
    }
}
