//! Bucketed counts over the filtered rows.
//!
//! The three engines share one shape: group row ids by a bucket key, then
//! value every group with [`count`]. Buckets are rebuilt from scratch each
//! time; nothing is maintained incrementally.

pub mod days;
pub mod hexbin;
pub mod words;

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::row::{Row, RowId, Schema};
use crate::store::RowStore;

pub use days::{aggregate_days, DayBucket};
pub use hexbin::{aggregate_hexbins, Axial, HexBins, HexBucket, HexGrid};
pub use words::{aggregate_words, WordBucket};

/// What a bucket's value measures.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationKey {
    /// Number of rows.
    #[default]
    None,
    /// Number of distinct values of the named grouping field.
    Field(String),
}

impl AggregationKey {
    pub fn field(name: impl Into<String>) -> Self {
        AggregationKey::Field(name.into())
    }
}

/// An [`AggregationKey`] resolved against a schema.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Counter {
    #[default]
    Rows,
    Distinct(usize),
}

impl Counter {
    pub fn resolve(key: &AggregationKey, schema: &Schema) -> Result<Self> {
        match key {
            AggregationKey::None => Ok(Counter::Rows),
            AggregationKey::Field(name) => schema.position(name).map(Counter::Distinct),
        }
    }

    fn check(self, schema: &Schema) -> Result<()> {
        match self {
            Counter::Distinct(index) if index >= schema.len() => {
                Err(Error::UnknownKeyField(format!("#{index}")))
            }
            _ => Ok(()),
        }
    }
}

/// Value of one group of rows: its size, or the number of distinct present
/// values of the counted field. Missing values are not counted.
pub fn count<'a>(rows: impl IntoIterator<Item = &'a Row>, counter: Counter) -> u64 {
    match counter {
        Counter::Rows => rows.into_iter().count() as u64,
        Counter::Distinct(index) => rows
            .into_iter()
            .filter_map(|row| row.key(index))
            .collect::<HashSet<&str>>()
            .len() as u64,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Bucket<K> {
    pub key: K,
    pub rows: Vec<RowId>,
    pub value: u64,
}

impl<K> Bucket<K> {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn group<K: Ord>(
    filtered: &[RowId],
    mut key: impl FnMut(RowId) -> Option<K>,
) -> BTreeMap<K, Vec<RowId>> {
    let mut groups: BTreeMap<K, Vec<RowId>> = BTreeMap::new();
    for &id in filtered {
        if let Some(k) = key(id) {
            groups.entry(k).or_default().push(id);
        }
    }
    groups
}

fn finish<K>(store: &RowStore, groups: BTreeMap<K, Vec<RowId>>, counter: Counter) -> Vec<Bucket<K>> {
    groups
        .into_iter()
        .map(|(key, rows)| {
            let value = count(rows.iter().filter_map(|&id| store.get(id)), counter);
            Bucket { key, rows, value }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<Row> {
        vec![
            Row::new(Some(0), 0.0, 0.0, "a").with_keys([Some("i1"), Some("alice")]),
            Row::new(Some(0), 0.0, 0.0, "a").with_keys([Some("i1"), Some("bob")]),
            Row::new(Some(0), 0.0, 0.0, "a").with_keys([Some("i2"), None]),
            Row::new(Some(0), 0.0, 0.0, "a").with_keys([Some("i3"), Some("")]),
        ]
    }

    #[test]
    fn rows_counter_counts_rows() {
        assert_eq!(count(&rows(), Counter::Rows), 4);
        assert_eq!(count(&[], Counter::Rows), 0);
    }

    #[test]
    fn distinct_counter_skips_missing_values() {
        let rows = rows();
        assert_eq!(count(&rows, Counter::Distinct(0)), 3);
        assert_eq!(count(&rows, Counter::Distinct(1)), 2);
    }

    #[test]
    fn resolve_fails_fast_on_unknown_field() {
        let schema = Schema::new(["item", "author"]);
        assert_eq!(
            Counter::resolve(&AggregationKey::field("author"), &schema).unwrap(),
            Counter::Distinct(1)
        );
        assert_eq!(
            Counter::resolve(&AggregationKey::None, &schema).unwrap(),
            Counter::Rows
        );
        assert!(matches!(
            Counter::resolve(&AggregationKey::field("colour"), &schema),
            Err(Error::UnknownKeyField(name)) if name == "colour"
        ));
        assert!(Counter::Distinct(2).check(&schema).is_err());
    }
}
