use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info_span, trace, warn};

use crate::aggregate::{AggregationKey, Counter};
use crate::error::{Error, Result};
use crate::predicate::{Filter, PartialFilter, Predicate, PredicateKind};
use crate::relay::{Event, Origin, Relay};
use crate::row::{Row, RowId, Schema};
use crate::store::RowStore;

/// Owner of the dataset, the three current predicates and the aggregation
/// key. Nothing else writes them.
#[derive(Debug)]
pub struct FilterComposer {
    relay: Relay,
    store: RowStore,
    filter: Filter,
    key: AggregationKey,
    counter: Counter,
    filtered: Vec<RowId>,
    writers: BTreeMap<PredicateKind, Origin>,
    revision: u64,
}

impl FilterComposer {
    pub fn new(schema: Schema, relay: Relay) -> Self {
        Self {
            relay,
            store: RowStore::new(schema),
            filter: Filter::default(),
            key: AggregationKey::None,
            counter: Counter::Rows,
            filtered: Vec::new(),
            writers: BTreeMap::new(),
            revision: 0,
        }
    }

    /// Swap the dataset and refilter it under the current predicates.
    pub fn replace(&mut self, rows: Arc<[Row]>) -> Result<()> {
        self.store.replace(rows)?;
        self.refilter();
        Ok(())
    }

    /// Replace the supplied predicate kinds, keep the others, and announce
    /// the kinds that actually changed.
    ///
    /// A view may only write the kind it owns.
    pub fn update(&mut self, origin: Origin, partial: PartialFilter) -> Result<PartialFilter> {
        if let Origin::View(view) = &origin {
            if let Some(kind) = partial.kinds().find(|kind| *kind != view.owns()) {
                warn!(?view, ?kind, "rejected update for a foreign predicate kind");
                return Err(Error::ForeignPredicate { view: *view, kind });
            }
        }

        let changed = self.filter.merge(partial);
        if changed.is_empty() {
            trace!(?origin, "update changed nothing");
            return Ok(changed);
        }
        for kind in changed.kinds() {
            self.writers.insert(kind, origin.clone());
        }
        debug!(?origin, kinds = ?changed.kinds().collect::<Vec<_>>(), "filter updated");

        self.refilter();
        self.relay.publish(Event::FilterChanged {
            origin,
            change: changed.clone(),
        });
        Ok(changed)
    }

    /// Switch between row counts and distinct-key counts. An unknown field
    /// is rejected here, before any aggregation runs. Returns whether the key
    /// changed.
    pub fn set_aggregation_key(&mut self, key: AggregationKey) -> Result<bool> {
        let counter = Counter::resolve(&key, self.store.schema())?;
        if key == self.key {
            return Ok(false);
        }
        debug!(?key, "aggregation key changed");
        self.key = key;
        self.counter = counter;
        self.revision += 1;
        Ok(true)
    }

    fn refilter(&mut self) {
        let _span = info_span!("refilter", rows = self.store.len()).entered();
        let filter = &self.filter;
        self.filtered = if filter.is_neutral() {
            (0..self.store.len()).collect()
        } else {
            self.store
                .rows()
                .iter()
                .enumerate()
                .filter(|(_, row)| filter.test(row))
                .map(|(id, _)| id)
                .collect()
        };
        self.revision += 1;
        trace!(matched = self.filtered.len(), "refiltered");
    }

    pub fn store(&self) -> &RowStore {
        &self.store
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Ids of the rows passing every predicate, in store order.
    pub fn filtered(&self) -> &[RowId] {
        &self.filtered
    }

    pub fn filtered_rows(&self) -> impl Iterator<Item = &Row> + '_ {
        self.filtered.iter().filter_map(|&id| self.store.get(id))
    }

    pub fn aggregation_key(&self) -> &AggregationKey {
        &self.key
    }

    pub fn counter(&self) -> Counter {
        self.counter
    }

    /// Origin of the most recent change to `kind`.
    pub fn writer(&self, kind: PredicateKind) -> Option<&Origin> {
        self.writers.get(&kind)
    }

    /// Bumped whenever the filtered rows or the counter change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{LexicalPredicate, SpatialPredicate, TemporalPredicate};
    use crate::projection::GeoBounds;
    use crate::view::ViewKind;

    fn composer() -> (FilterComposer, crate::relay::Subscription) {
        let relay = Relay::new();
        let watcher = relay.subscribe(None);
        let mut composer = FilterComposer::new(Schema::new(["author"]), relay);
        composer
            .replace(
                vec![
                    Row::new(Some(10), 45.0, 9.0, "pizza").with_keys([Some("ann")]),
                    Row::new(Some(20), 41.9, 12.5, "mare").with_keys([Some("bo")]),
                    Row::new(Some(30), 40.8, 14.2, "pizza").with_keys([Some("ann")]),
                    Row::new(None, f64::NAN, 14.2, "sole").with_keys([None::<&str>]),
                ]
                .into(),
            )
            .unwrap();
        (composer, watcher)
    }

    #[test]
    fn omitted_kinds_keep_their_predicate() {
        let (mut composer, _) = composer();
        composer
            .update(
                ViewKind::Timeline.into(),
                PartialFilter::temporal(TemporalPredicate::between(10, 20)),
            )
            .unwrap();
        composer
            .update(
                ViewKind::Lexicon.into(),
                PartialFilter::lexical(LexicalPredicate::words(["pizza"])),
            )
            .unwrap();
        assert_eq!(
            composer.filter().temporal,
            TemporalPredicate::Between { start: 10, end: 20 }
        );
        assert_eq!(composer.filtered(), &[0]);
        assert_eq!(
            composer.writer(PredicateKind::Temporal),
            Some(&Origin::View(ViewKind::Timeline))
        );
        assert_eq!(composer.writer(PredicateKind::Spatial), None);
    }

    #[test]
    fn publishes_only_changed_kinds() {
        let (mut composer, watcher) = composer();
        let change = PartialFilter::lexical(LexicalPredicate::words(["mare"]));
        composer.update(ViewKind::Lexicon.into(), change.clone()).unwrap();
        composer.update(ViewKind::Lexicon.into(), change.clone()).unwrap();

        let events = watcher.drain();
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::FilterChanged { origin, change: published } => {
                assert_eq!(origin, &Origin::View(ViewKind::Lexicon));
                assert_eq!(published, &change);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn views_may_not_write_foreign_kinds() {
        let (mut composer, watcher) = composer();
        let before = composer.revision();
        let result = composer.update(
            ViewKind::Map.into(),
            PartialFilter {
                spatial: Some(SpatialPredicate::All),
                lexical: Some(LexicalPredicate::words(["pizza"])),
                ..PartialFilter::default()
            },
        );
        assert!(matches!(
            result,
            Err(Error::ForeignPredicate {
                view: ViewKind::Map,
                kind: PredicateKind::Lexical
            })
        ));
        assert_eq!(composer.revision(), before);
        assert_eq!(watcher.pending(), 0);

        composer
            .update(
                Origin::external("script"),
                PartialFilter {
                    temporal: Some(TemporalPredicate::between(0, 100)),
                    lexical: Some(LexicalPredicate::words(["pizza"])),
                    ..PartialFilter::default()
                },
            )
            .unwrap();
        assert_eq!(composer.filtered(), &[0, 2]);
    }

    #[test]
    fn malformed_rows_only_pass_neutral_predicates() {
        let (mut composer, _) = composer();
        assert_eq!(composer.filtered().len(), 4);
        composer
            .update(
                ViewKind::Map.into(),
                PartialFilter::spatial(SpatialPredicate::Within(GeoBounds {
                    west: -180.0,
                    east: 180.0,
                    south: -90.0,
                    north: 90.0,
                })),
            )
            .unwrap();
        assert_eq!(composer.filtered(), &[0, 1, 2]);
    }

    #[test]
    fn unknown_aggregation_key_fails_fast() {
        let (mut composer, _) = composer();
        assert!(composer
            .set_aggregation_key(AggregationKey::field("colour"))
            .is_err());
        assert_eq!(composer.aggregation_key(), &AggregationKey::None);
        assert!(composer
            .set_aggregation_key(AggregationKey::field("author"))
            .unwrap());
        assert_eq!(composer.counter(), Counter::Distinct(0));
        assert!(!composer
            .set_aggregation_key(AggregationKey::field("author"))
            .unwrap());
    }
}
