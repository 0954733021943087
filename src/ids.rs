//! Generated id codec and day arithmetic
//!
//! Generated ids are opaque but totally ordered: the top 42 bits carry a
//! millisecond epoch timestamp, the low 22 bits a sequence discriminator.
//! The string form is fixed-width lowercase hex, so lexicographic order on
//! store keys matches numeric order on ids.

use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveTime, TimeZone, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::Error;

const SEQUENCE_BITS: u32 = 22;
const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;

/// Time-ordered opaque identifier for entities and lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct GeneratedId(pub u64);

/// The smallest possible generated id.
pub const GENERATED_MIN_ID: GeneratedId = GeneratedId(0);
/// The largest possible generated id.
pub const GENERATED_MAX_ID: GeneratedId = GeneratedId(u64::MAX);

impl GeneratedId {
    /// Build an id embedding `timestamp_ms` with a sequence discriminator
    /// to keep ids minted within the same millisecond distinct.
    pub fn new(timestamp_ms: i64, sequence: u32) -> Self {
        let ts = timestamp_ms.max(0) as u64;
        Self((ts << SEQUENCE_BITS) | (sequence as u64 & SEQUENCE_MASK))
    }

    /// The embedded millisecond timestamp.
    pub fn timestamp_ms(&self) -> i64 {
        (self.0 >> SEQUENCE_BITS) as i64
    }
}

impl fmt::Display for GeneratedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for GeneratedId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16)
            .map(GeneratedId)
            .map_err(|_| Error::Internal(format!("malformed generated id: {}", s)))
    }
}

impl Serialize for GeneratedId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for GeneratedId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(|e: Error| D::Error::custom(e.to_string()))
    }
}

/// The smallest generated id whose embedded time is `>= timestamp_ms`.
pub fn timestamp_to_id(timestamp_ms: i64) -> GeneratedId {
    GeneratedId((timestamp_ms.max(0) as u64) << SEQUENCE_BITS)
}

/// Inverse of [`timestamp_to_id`]; exact on day-aligned round trips.
pub fn id_to_timestamp(id: &GeneratedId) -> i64 {
    id.timestamp_ms()
}

/// UTC midnight of the day `day_offset` days away from `now_ms`
/// (negative offsets reach into the past).
pub fn start_of_day_shifted(now_ms: i64, day_offset: i64) -> i64 {
    let date = Utc
        .timestamp_millis_opt(now_ms)
        .single()
        .map(|dt| dt.date_naive())
        .unwrap_or_default();
    let shifted = date + Duration::days(day_offset);
    Utc.from_utc_datetime(&shifted.and_time(NaiveTime::MIN))
        .timestamp_millis()
}
