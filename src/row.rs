use std::sync::Arc;

use crate::error::{Error, Result};

/// Index of a row inside the current [`RowStore`](crate::store::RowStore).
pub type RowId = usize;

/// One ingested event.
///
/// `time` is epoch milliseconds; `None` marks a timestamp that failed to
/// parse. Malformed coordinates are kept as `NaN`. Neither is dropped at
/// ingestion: non-neutral predicates reject them instead.
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    pub time: Option<i64>,
    pub latitude: f64,
    pub longitude: f64,
    pub word: Arc<str>,
    /// Grouping-key values, positionally aligned with [`Schema::fields`].
    pub keys: Box<[Option<Arc<str>>]>,
}

impl Row {
    pub fn new(time: Option<i64>, latitude: f64, longitude: f64, word: impl Into<Arc<str>>) -> Self {
        Self {
            time,
            latitude,
            longitude,
            word: word.into(),
            keys: Vec::new().into_boxed_slice(),
        }
    }

    pub fn with_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<Arc<str>>,
    {
        self.keys = keys.into_iter().map(|key| key.map(Into::into)).collect();
        self
    }

    /// Value of the grouping field at `index`, treating empty strings as missing.
    pub fn key(&self, index: usize) -> Option<&str> {
        self.keys
            .get(index)
            .and_then(|key| key.as_deref())
            .filter(|key| !key.is_empty())
    }

    pub fn has_position(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Names of the grouping-key fields every row carries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Schema {
    fields: Arc<[Arc<str>]>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new(Vec::<Arc<str>>::new())
    }
}

impl Schema {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[Arc<str>] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn position(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|field| field.as_ref() == name)
            .ok_or_else(|| Error::UnknownKeyField(name.to_owned()))
    }

    pub(crate) fn check(&self, rows: &[Row]) -> Result<()> {
        match rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.keys.len() != self.len())
        {
            Some((row, found)) => Err(Error::SchemaMismatch {
                row,
                expected: self.len(),
                found: found.keys.len(),
            }),
            None => Ok(()),
        }
    }
}
