use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// a single moisture/light observation
///
/// immutable once built. readings are reconstituted read-only from storage
/// for queries and detection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// when the reading was taken
    pub date: DateTime<Utc>,

    /// soil moisture level
    ///
    /// must be finite before it reaches `stats` or `detection`.
    /// the pure functions there do not check.
    pub moisture: f64,

    /// light level, 0 when the sensor has no light probe
    #[serde(default)]
    pub light: f64,
}

impl Reading {
    pub fn new(date: DateTime<Utc>, moisture: f64, light: f64) -> Self {
        Self { date, moisture, light }
    }
}

/// a reading as posted by a sensor node
///
/// `date` is optional on the wire. a `None` date marks the reading as
/// pending until `normalize` stamps it.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct PendingReading {
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    pub moisture: f64,
    #[serde(default)]
    pub light: f64,
}

/// persisted record shape
///
/// `expiry` is attached by the storage adapters at write time, the backend
/// drops the document once it passes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StoredReading {
    pub date: DateTime<Utc>,
    pub moisture: f64,
    pub light: f64,
    pub expiry: DateTime<Utc>,
}

impl StoredReading {
    pub fn from_reading(reading: &Reading, expiry_horizon: Duration) -> Self {
        Self {
            date: reading.date,
            moisture: reading.moisture,
            light: reading.light,
            expiry: reading
                .date
                .checked_add_signed(expiry_horizon)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn reading(&self) -> Reading {
        Reading::new(self.date, self.moisture, self.light)
    }
}

/// stamp every pending reading with the current wall-clock time
///
/// the clock is read once per batch. the i-th pending reading gets
/// `now + i` nanoseconds so stamped readings keep their batch order and
/// never tie with each other.
pub fn normalize(readings: Vec<PendingReading>) -> Vec<Reading> {
    normalize_at(readings, Utc::now())
}

/// same as `normalize` with an explicit clock
pub fn normalize_at(readings: Vec<PendingReading>, now: DateTime<Utc>) -> Vec<Reading> {
    let mut stamped = 0;
    readings
        .into_iter()
        .map(|pending| {
            let date = pending.date.unwrap_or_else(|| {
                let date = now + Duration::nanoseconds(stamped);
                stamped += 1;
                date
            });
            Reading { date, moisture: pending.moisture, light: pending.light }
        })
        .collect()
}
