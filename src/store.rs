use std::sync::Arc;

use chrono::NaiveDate;
use tracing::debug;

use crate::config::DayZone;
use crate::error::{Error, Result};
use crate::projection::Projection;
use crate::row::{Row, RowId, Schema};

/// The ingested dataset. Replaced wholesale, never edited in place.
#[derive(Debug)]
pub struct RowStore {
    schema: Schema,
    rows: Arc<[Row]>,
    generation: u64,
}

impl RowStore {
    pub fn new(schema: Schema) -> Self {
        Self {
            schema,
            rows: Arc::from(Vec::new()),
            generation: 0,
        }
    }

    /// Swap in a new dataset. Rejected rows leave the current one in place.
    pub fn replace(&mut self, rows: Arc<[Row]>) -> Result<()> {
        self.schema.check(&rows)?;
        self.rows = rows;
        self.generation += 1;
        debug!(
            rows = self.rows.len(),
            generation = self.generation,
            "dataset replaced"
        );
        Ok(())
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(id)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Bumped on every successful [`replace`](Self::replace).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Smallest and largest valid timestamp.
    pub fn time_extent(&self) -> Option<[i64; 2]> {
        let mut times = self.rows.iter().filter_map(|row| row.time);
        let first = times.next()?;
        Some(times.fold([first, first], |[lo, hi], t| [lo.min(t), hi.max(t)]))
    }
}

/// A per-row derived value, pinned to the store generation it was built from.
#[derive(Clone, Debug)]
pub struct Facet<T> {
    generation: u64,
    values: Vec<Option<T>>,
}

impl<T> Default for Facet<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            values: Vec::new(),
        }
    }
}

impl<T> Facet<T> {
    pub fn derive(store: &RowStore, derive: impl FnMut(&Row) -> Option<T>) -> Self {
        Self {
            generation: store.generation(),
            values: store.rows().iter().map(derive).collect(),
        }
    }

    pub fn get(&self, id: RowId) -> Option<&T> {
        self.values.get(id).and_then(Option::as_ref)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, store: &RowStore) -> bool {
        self.generation == store.generation()
    }

    pub fn check(&self, store: &RowStore) -> Result<()> {
        if self.is_current(store) {
            Ok(())
        } else {
            Err(Error::StaleFacet {
                facet: self.generation,
                store: store.generation(),
            })
        }
    }
}

/// Calendar day of each row; rows without a valid time get none.
pub type DayLabels = Facet<NaiveDate>;

/// Projected screen position of each row.
pub type ScreenPoints = Facet<[f64; 2]>;

pub fn day_labels(store: &RowStore, zone: DayZone) -> DayLabels {
    Facet::derive(store, |row| row.time.and_then(|time| zone.day(time)))
}

pub fn screen_points(store: &RowStore, projection: &dyn Projection) -> ScreenPoints {
    Facet::derive(store, |row| {
        projection
            .project(row.longitude, row.latitude)
            .filter(|[x, y]| x.is_finite() && y.is_finite())
    })
}
