use std::sync::Arc;

use tracing::debug_span;

use super::{finish, group, Bucket, Counter};
use crate::error::Result;
use crate::row::RowId;
use crate::store::RowStore;

pub type WordBucket = Bucket<Arc<str>>;

/// Buckets per word, highest value first, ties in ascending word order.
pub fn aggregate_words(
    store: &RowStore,
    filtered: &[RowId],
    counter: Counter,
) -> Result<Vec<WordBucket>> {
    let _span = debug_span!("aggregate_words", rows = filtered.len()).entered();
    counter.check(store.schema())?;

    let groups = group(filtered, |id| store.get(id).map(|row| Arc::clone(&row.word)));
    // Groups come out word-ascending; a stable sort keeps that order on ties.
    let mut buckets = finish(store, groups, counter);
    buckets.sort_by(|a, b| b.value.cmp(&a.value));
    Ok(buckets)
}

/// `word (value)`, the way the word list shows an entry.
pub fn label(bucket: &WordBucket) -> String {
    format!("{} ({})", bucket.key, bucket.value)
}
