//! Engine configuration.
//!
//! Every section has a usable default, so `EngineConfig::default()` is enough
//! to run a session over the usual `timestamp,latitude,longitude,word` layout.

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::row::Schema;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ingest: IngestConfig,
    pub days: DayZone,
    pub map: MapConfig,
    pub timeline: TimelineConfig,
    /// Minimum spacing between two recomputes during a live gesture.
    /// Zero disables coalescing.
    pub throttle_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ingest: IngestConfig::default(),
            days: DayZone::default(),
            map: MapConfig::default(),
            timeline: TimelineConfig::default(),
            throttle_ms: 50,
        }
    }
}

impl EngineConfig {
    pub fn with_key_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ingest.keys = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_day_zone(mut self, days: DayZone) -> Self {
        self.days = days;
        self
    }

    pub fn with_viewport(mut self, viewport: [[f64; 2]; 2]) -> Self {
        self.map.viewport = viewport;
        self
    }

    pub fn with_hex_radius(mut self, radius: f64) -> Self {
        self.map.hex_radius = radius;
        self
    }

    pub fn with_timeline_range(mut self, range: [f64; 2]) -> Self {
        self.timeline.range = range;
        self
    }

    pub fn with_throttle(mut self, interval: Duration) -> Self {
        self.throttle_ms = interval.as_millis() as u64;
        self
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn schema(&self) -> Schema {
        Schema::new(self.ingest.keys.iter().map(String::as_str))
    }

    pub fn validate(&self) -> Result<()> {
        let radius = self.map.hex_radius;
        if !(radius.is_finite() && radius > 0.0) {
            return Err(Error::Config(format!("hex radius must be positive, got {radius}")));
        }
        let [[x0, y0], [x1, y1]] = self.map.viewport;
        if !(x1 > x0 && y1 > y0) {
            return Err(Error::Config(format!(
                "viewport [[{x0}, {y0}], [{x1}, {y1}]] is empty"
            )));
        }
        let [r0, r1] = self.timeline.range;
        if !(r0.is_finite() && r1.is_finite()) || r0 == r1 {
            return Err(Error::Config(format!("timeline range [{r0}, {r1}] is empty")));
        }
        if let DayZone::Fixed { offset_seconds } = self.days {
            if FixedOffset::east_opt(offset_seconds).is_none() {
                return Err(Error::Config(format!("utc offset {offset_seconds}s out of range")));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub timestamp: String,
    pub latitude: String,
    pub longitude: String,
    pub word: String,
    /// Grouping-key columns, in schema order.
    pub keys: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            timestamp: "timestamp".to_owned(),
            latitude: "latitude".to_owned(),
            longitude: "longitude".to_owned(),
            word: "word".to_owned(),
            keys: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    /// Screen rectangle `[[left, top], [right, bottom]]` the projection is fitted into.
    pub viewport: [[f64; 2]; 2],
    pub hex_radius: f64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            viewport: [[20.0, 20.0], [960.0, 600.0]],
            hex_radius: 10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineConfig {
    /// Pixel range the data's time extent is mapped onto.
    pub range: [f64; 2],
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            range: [0.0, 900.0],
        }
    }
}

/// Time zone calendar days are cut in.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayZone {
    #[default]
    Local,
    Utc,
    Fixed {
        offset_seconds: i32,
    },
}

impl DayZone {
    /// Calendar day containing the instant `millis`.
    pub fn day(self, millis: i64) -> Option<NaiveDate> {
        let instant = DateTime::<Utc>::from_timestamp_millis(millis)?;
        Some(match self {
            DayZone::Local => instant.with_timezone(&Local).date_naive(),
            DayZone::Utc => instant.date_naive(),
            DayZone::Fixed { offset_seconds } => instant
                .with_timezone(&FixedOffset::east_opt(offset_seconds)?)
                .date_naive(),
        })
    }

    /// Epoch milliseconds of a wall-clock time read in this zone.
    pub fn millis(self, naive: NaiveDateTime) -> Option<i64> {
        let instant = match self {
            DayZone::Local => Local.from_local_datetime(&naive).earliest()?.timestamp_millis(),
            DayZone::Utc => Utc.from_utc_datetime(&naive).timestamp_millis(),
            DayZone::Fixed { offset_seconds } => FixedOffset::east_opt(offset_seconds)?
                .from_local_datetime(&naive)
                .single()?
                .timestamp_millis(),
        };
        Some(instant)
    }
}
