use chrono::NaiveDate;
use tracing::debug_span;

use super::{finish, group, Bucket, Counter};
use crate::error::Result;
use crate::row::RowId;
use crate::store::{DayLabels, RowStore};

pub type DayBucket = Bucket<NaiveDate>;

/// One bucket per calendar day present among `filtered`, oldest first.
///
/// Days come from the precomputed `labels`, which must belong to the
/// current dataset.
pub fn aggregate_days(
    store: &RowStore,
    labels: &DayLabels,
    filtered: &[RowId],
    counter: Counter,
) -> Result<Vec<DayBucket>> {
    let _span = debug_span!("aggregate_days", rows = filtered.len()).entered();
    counter.check(store.schema())?;
    labels.check(store)?;

    let groups = group(filtered, |id| labels.get(id).copied());
    Ok(finish(store, groups, counter))
}

pub fn label(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
