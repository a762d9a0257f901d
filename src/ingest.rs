//! CSV ingestion.
//!
//! Malformed fields never reject a row: coordinates that do not parse become
//! `NaN`, timestamps that do not parse become `None`, empty key cells are
//! missing values.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info_span};

use crate::config::{DayZone, IngestConfig};
use crate::error::{Error, Result};
use crate::row::Row;

/// Wall-clock layouts read in the configured day zone.
const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

struct Columns {
    time: usize,
    latitude: usize,
    longitude: usize,
    word: usize,
    keys: Vec<usize>,
}

impl Columns {
    fn locate(headers: &StringRecord, config: &IngestConfig) -> Result<Self> {
        let column = |name: &str| {
            headers
                .iter()
                .position(|header| header == name)
                .ok_or_else(|| Error::MissingColumn(name.to_owned()))
        };
        Ok(Self {
            time: column(&config.timestamp)?,
            latitude: column(&config.latitude)?,
            longitude: column(&config.longitude)?,
            word: column(&config.word)?,
            keys: config
                .keys
                .iter()
                .map(|key| column(key))
                .collect::<Result<_>>()?,
        })
    }
}

pub fn read_csv<R: Read>(reader: R, config: &IngestConfig, zone: DayZone) -> Result<Vec<Row>> {
    let _span = info_span!("read_csv").entered();
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);
    let columns = Columns::locate(reader.headers()?, config)?;

    let mut rows = Vec::new();
    let mut malformed = 0usize;
    for record in reader.records() {
        let record = record?;
        let field = |index: usize| record.get(index).unwrap_or("");
        let row = Row::new(
            parse_time(field(columns.time), zone),
            parse_degrees(field(columns.latitude)),
            parse_degrees(field(columns.longitude)),
            field(columns.word),
        )
        .with_keys(columns.keys.iter().map(|&index| {
            let value = field(index);
            (!value.is_empty()).then_some(value)
        }));
        if row.time.is_none() || !row.has_position() {
            malformed += 1;
        }
        rows.push(row);
    }
    debug!(rows = rows.len(), malformed, "csv read");
    Ok(rows)
}

pub fn read_csv_path(path: impl AsRef<Path>, config: &IngestConfig, zone: DayZone) -> Result<Vec<Row>> {
    read_csv(File::open(path)?, config, zone)
}

fn parse_degrees(field: &str) -> f64 {
    field.parse().unwrap_or(f64::NAN)
}

/// Epoch milliseconds, RFC 3339, a naive date-time or a bare date.
pub fn parse_time(field: &str, zone: DayZone) -> Option<i64> {
    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    if let Ok(millis) = field.parse::<i64>() {
        return Some(millis);
    }
    if let Ok(instant) = DateTime::parse_from_rfc3339(field) {
        return Some(instant.timestamp_millis());
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(field, format) {
            return zone.millis(naive);
        }
    }
    let date = NaiveDate::parse_from_str(field, "%Y-%m-%d").ok()?;
    zone.millis(date.and_hms_opt(0, 0, 0)?)
}
