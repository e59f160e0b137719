//! `HH:mm` wire format for wall-clock times.
//!
//! Availability windows and appointments store times as `"09:30"`; seconds
//! are accepted on input and dropped on output.

use chrono::NaiveTime;
use serde::{Deserialize, Deserializer, Serializer};

pub const HHMM: &str = "%H:%M";

pub fn parse_hhmm(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, HHMM)
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

pub fn format_hhmm(time: NaiveTime) -> String {
    time.format(HHMM).to_string()
}

pub fn serialize<S>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_hhmm(*time))
}

pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveTime, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_hhmm(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid HH:mm time '{}'", raw)))
}

pub mod option {
    use super::*;

    pub fn serialize<S>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => serializer.serialize_str(&format_hhmm(*t)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            Some(value) => parse_hhmm(&value)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid HH:mm time '{}'", value))),
            None => Ok(None),
        }
    }
}
