//! One analysis session: the relay, the composer and the three views.
//!
//! Mutations are requested through the relay (`ingest`, `select`,
//! `set_counter`) and take effect in [`Session::settle`], which applies them
//! one at a time, in publish order, letting every view catch up after each.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use tracing::{debug, info_span, trace};

use crate::aggregate::AggregationKey;
use crate::composer::FilterComposer;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::ingest;
use crate::predicate::PartialFilter;
use crate::relay::{Event, Origin, Relay, Subscription};
use crate::row::Row;
use crate::throttle::Coalescer;
use crate::view::{LexiconView, LinkedView, MapView, Selection, TimelineView, ViewKind};

/// A session shared between the widgets of a multi-view UI.
pub type SharedSession = Arc<RwLock<Session>>;
/// Owned read access to a [`SharedSession`], e.g. for a frame's worth of drawing.
pub type SessionReadGuard = ArcRwLockReadGuard<RawRwLock, Session>;
pub type SessionWriteGuard = ArcRwLockWriteGuard<RawRwLock, Session>;

#[derive(Debug)]
pub struct Session {
    config: EngineConfig,
    relay: Relay,
    control: Subscription,
    composer: FilterComposer,
    map: MapView,
    timeline: TimelineView,
    lexicon: LexiconView,
    gestures: BTreeMap<ViewKind, Coalescer<Selection>>,
}

impl Session {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let relay = Relay::new();
        let control = relay.subscribe(None);
        let composer = FilterComposer::new(config.schema(), relay.clone());
        let map = MapView::new(&relay, &config.map)?;
        let timeline = TimelineView::new(&relay, &config.timeline, config.days);
        let lexicon = LexiconView::new(&relay);
        let gestures = ViewKind::ALL
            .into_iter()
            .map(|view| (view, Coalescer::new(config.throttle())))
            .collect();
        debug!(keys = ?config.ingest.keys, "session created");
        Ok(Self {
            config,
            relay,
            control,
            composer,
            map,
            timeline,
            lexicon,
            gestures,
        })
    }

    pub fn shared(self) -> SharedSession {
        Arc::new(RwLock::new(self))
    }

    /// Queue a new dataset.
    pub fn ingest(&self, rows: impl Into<Arc<[Row]>>) {
        self.relay.publish(Event::DatasetChanged(rows.into()));
    }

    /// Read CSV with the configured columns and queue it as the new dataset.
    /// Returns the number of rows read.
    pub fn ingest_csv<R: Read>(&self, reader: R) -> Result<usize> {
        let rows = ingest::read_csv(reader, &self.config.ingest, self.config.days)?;
        let count = rows.len();
        self.ingest(rows);
        Ok(count)
    }

    pub fn ingest_csv_path(&self, path: impl AsRef<Path>) -> Result<usize> {
        let rows = ingest::read_csv_path(path, &self.config.ingest, self.config.days)?;
        let count = rows.len();
        self.ingest(rows);
        Ok(count)
    }

    /// Queue a raw selection made in `view`.
    pub fn select(&self, view: ViewKind, selection: Selection) {
        self.relay.publish(Event::SelectionChanged { view, selection });
    }

    pub fn set_counter(&self, key: AggregationKey) {
        self.relay.publish(Event::CounterChanged(key));
    }

    /// Apply a predicate update straight away, e.g. from a script. Views
    /// catch up on the next settle.
    pub fn update(&mut self, origin: Origin, partial: PartialFilter) -> Result<PartialFilter> {
        self.composer.update(origin, partial)
    }

    /// Feed one step of a live gesture. Returns whether it was published
    /// rather than held back by the throttle.
    pub fn gesture(&mut self, view: ViewKind, selection: Selection, now: Instant) -> bool {
        let Some(coalescer) = self.gestures.get_mut(&view) else {
            return false;
        };
        match coalescer.offer(selection, now) {
            Some(selection) => {
                self.select(view, selection);
                true
            }
            None => false,
        }
    }

    /// The gesture in `view` ended: publish its last held-back selection.
    pub fn gesture_end(&mut self, view: ViewKind) -> bool {
        let pending = self.gestures.get_mut(&view).and_then(Coalescer::flush);
        match pending {
            Some(selection) => {
                self.select(view, selection);
                true
            }
            None => false,
        }
    }

    /// Publish held-back selections whose interval has elapsed.
    pub fn tick(&mut self, now: Instant) -> usize {
        let due: Vec<(ViewKind, Selection)> = self
            .gestures
            .iter_mut()
            .filter_map(|(view, coalescer)| coalescer.poll(now).map(|selection| (*view, selection)))
            .collect();
        let published = due.len();
        for (view, selection) in due {
            self.select(view, selection);
        }
        published
    }

    /// Apply every queued request and bring every view up to date. Returns
    /// the number of requests applied.
    ///
    /// On error the failing request is dropped, the requests behind it stay
    /// queued and the views are left as they were. A selection that fails to
    /// translate or is refused by the composer is never drawn.
    pub fn settle(&mut self) -> Result<usize> {
        let _span = info_span!("settle").entered();
        let mut applied = 0;
        loop {
            self.poll_views()?;
            let Some(event) = self.control.try_recv() else {
                return Ok(applied);
            };
            if self.apply(event)? {
                applied += 1;
            }
        }
    }

    fn poll_views(&mut self) -> Result<()> {
        let composer = &self.composer;
        let views: [&mut dyn LinkedView; 3] =
            [&mut self.map, &mut self.timeline, &mut self.lexicon];
        for view in views {
            if view.poll(composer)? {
                trace!(view = ?view.kind(), "view refreshed");
            }
        }
        Ok(())
    }

    /// Returns false for the composer's own announcements, which need no
    /// handling here.
    fn apply(&mut self, event: Event) -> Result<bool> {
        match event {
            Event::DatasetChanged(rows) => self.composer.replace(rows)?,
            Event::CounterChanged(key) => {
                self.composer.set_aggregation_key(key)?;
            }
            Event::SelectionChanged { view, selection } => {
                let partial = self.view(view).translate(&selection)?;
                self.composer.update(view.into(), partial)?;
                self.view_mut(view).accept(selection)?;
            }
            Event::FilterChanged { .. } => return Ok(false),
        }
        Ok(true)
    }

    pub fn view(&self, kind: ViewKind) -> &dyn LinkedView {
        match kind {
            ViewKind::Map => &self.map,
            ViewKind::Timeline => &self.timeline,
            ViewKind::Lexicon => &self.lexicon,
        }
    }

    fn view_mut(&mut self, kind: ViewKind) -> &mut dyn LinkedView {
        match kind {
            ViewKind::Map => &mut self.map,
            ViewKind::Timeline => &mut self.timeline,
            ViewKind::Lexicon => &mut self.lexicon,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    pub fn composer(&self) -> &FilterComposer {
        &self.composer
    }

    pub fn map(&self) -> &MapView {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut MapView {
        &mut self.map
    }

    pub fn timeline(&self) -> &TimelineView {
        &self.timeline
    }

    pub fn lexicon(&self) -> &LexiconView {
        &self.lexicon
    }

    /// Tear the relay down. Queued requests are discarded and later ones
    /// are ignored.
    pub fn close(&self) {
        self.relay.close();
    }

    pub fn is_closed(&self) -> bool {
        self.relay.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::Error;
    use crate::predicate::{LexicalPredicate, PredicateKind, SpatialPredicate, TemporalPredicate};
    use crate::projection::Projection;
    use crate::translate::PixelRect;

    const DAY: i64 = 86_400_000;
    const JAN1: i64 = 1_704_067_200_000;

    fn rows() -> Vec<Row> {
        vec![
            Row::new(Some(JAN1), 45.0, 9.0, "pizza").with_keys([Some("ann")]),
            Row::new(Some(JAN1 + DAY), 41.9, 12.5, "mare").with_keys([Some("bo")]),
            Row::new(Some(JAN1 + 2 * DAY), 40.8, 14.2, "pizza").with_keys([Some("bo")]),
        ]
    }

    fn session() -> Session {
        let config = EngineConfig::default()
            .with_key_columns(["author"])
            .with_day_zone(crate::config::DayZone::Utc)
            .with_throttle(Duration::from_millis(50));
        let mut session = Session::new(config).unwrap();
        session.ingest(rows());
        session.settle().unwrap();
        session
    }

    #[test]
    fn requests_wait_for_settle() {
        let mut session = session();
        session.select(ViewKind::Lexicon, Selection::words(["pizza"]));
        assert_eq!(session.composer().filtered().len(), 3);
        assert_eq!(session.settle().unwrap(), 1);
        assert_eq!(session.composer().filtered(), &[0, 2]);
        assert_eq!(session.timeline().days().len(), 2);
        assert!(session.lexicon().is_selected("pizza"));
    }

    #[test]
    fn counter_change_reaches_every_view() {
        let mut session = session();
        session.set_counter(AggregationKey::field("author"));
        session.settle().unwrap();
        let words = session.lexicon().labels();
        assert_eq!(words, vec!["pizza (2)", "mare (1)"]);
        assert_eq!(session.map().bins().total(), 3);

        session.set_counter(AggregationKey::field("colour"));
        assert!(matches!(session.settle(), Err(Error::UnknownKeyField(_))));
        assert_eq!(session.composer().aggregation_key(), &AggregationKey::field("author"));
    }

    #[test]
    fn wrong_selection_for_view_is_an_error() {
        let mut session = session();
        session.select(ViewKind::Map, Selection::words(["pizza"]));
        assert!(matches!(
            session.settle(),
            Err(Error::SelectionMismatch(ViewKind::Map))
        ));
        assert_eq!(session.settle().unwrap(), 0);
        assert!(session.map().selection().is_none());
    }

    /// Inverts only points inside a 100 px square.
    struct Square;

    impl Projection for Square {
        fn project(&self, longitude: f64, latitude: f64) -> Option<[f64; 2]> {
            Some([longitude + 50.0, 50.0 - latitude])
        }

        fn invert(&self, [x, y]: [f64; 2]) -> Option<[f64; 2]> {
            ((0.0..=100.0).contains(&x) && (0.0..=100.0).contains(&y))
                .then(|| [x - 50.0, 50.0 - y])
        }
    }

    #[test]
    fn untranslatable_brush_is_never_drawn() {
        let mut session = session();
        session.map_mut().set_projection(Arc::new(Square));
        session.settle().unwrap();

        let rect = PixelRect::new([40.0, 20.0], [150.0, 60.0]);
        session.select(ViewKind::Map, Selection::Rect(Some(rect)));
        assert!(matches!(
            session.settle(),
            Err(Error::Projection { x, y }) if x == 150.0 && y == 60.0
        ));
        assert_eq!(session.settle().unwrap(), 0);
        assert_eq!(session.map().selection(), None);
        assert_eq!(session.composer().filter().spatial, SpatialPredicate::All);

        let rect = PixelRect::new([55.0, 0.0], [60.0, 7.0]);
        session.select(ViewKind::Map, Selection::Rect(Some(rect)));
        session.settle().unwrap();
        assert_eq!(session.map().selection(), Some(rect));
        assert_eq!(session.composer().filtered(), &[0]);
    }

    #[test]
    fn foreign_write_queued_before_a_selection_does_not_erase_it() {
        let mut session = session();
        session.select(ViewKind::Lexicon, Selection::words(["mare"]));
        session
            .update(
                Origin::external("query"),
                PartialFilter::lexical(LexicalPredicate::words(["pizza"])),
            )
            .unwrap();
        session.settle().unwrap();
        assert!(session.lexicon().is_selected("mare"));
        assert_eq!(session.composer().filtered(), &[1]);
    }

    #[test]
    fn throttled_gesture_settles_on_final_selection() {
        let mut session = session();
        let start = Instant::now();
        let ms = Duration::from_millis(1);
        assert!(session.gesture(ViewKind::Timeline, Selection::Span(Some([JAN1, JAN1])), start));
        assert!(!session.gesture(
            ViewKind::Timeline,
            Selection::Span(Some([JAN1, JAN1 + DAY])),
            start + 5 * ms
        ));
        assert!(!session.gesture(
            ViewKind::Timeline,
            Selection::Span(Some([JAN1, JAN1 + 2 * DAY])),
            start + 10 * ms
        ));
        assert_eq!(session.tick(start + 20 * ms), 0);
        assert!(session.gesture_end(ViewKind::Timeline));
        session.settle().unwrap();
        assert_eq!(
            session.composer().filter().temporal,
            TemporalPredicate::between(JAN1, JAN1 + 2 * DAY)
        );
        assert_eq!(session.composer().filtered().len(), 3);
        assert_eq!(session.timeline().selection(), Some([JAN1, JAN1 + 2 * DAY]));
    }

    #[test]
    fn external_updates_apply_immediately() {
        let mut session = session();
        session
            .update(
                Origin::external("query"),
                PartialFilter::lexical(LexicalPredicate::words(["mare"])),
            )
            .unwrap();
        assert_eq!(session.composer().filtered(), &[1]);
        assert_eq!(
            session.composer().writer(PredicateKind::Lexical),
            Some(&Origin::external("query"))
        );
        session.settle().unwrap();
        assert_eq!(session.lexicon().labels(), vec!["mare (1)"]);
    }

    #[test]
    fn closed_session_ignores_requests() {
        let mut session = session();
        session.close();
        session.select(ViewKind::Lexicon, Selection::words(["mare"]));
        assert_eq!(session.settle().unwrap(), 0);
        assert_eq!(session.composer().filtered().len(), 3);
        assert!(session.is_closed());
    }

    #[test]
    fn shared_session_hands_out_owned_guards() {
        let shared = session().shared();
        let reader: SessionReadGuard = shared.read_arc();
        assert_eq!(reader.composer().store().len(), 3);
        drop(reader);

        let mut writer: SessionWriteGuard = shared.write_arc();
        writer.select(ViewKind::Lexicon, Selection::words(["mare"]));
        writer.settle().unwrap();
        drop(writer);
        assert_eq!(shared.read().lexicon().labels(), vec!["mare (1)"]);
    }

    #[test]
    fn csv_ingest_goes_through_the_relay() {
        let config = EngineConfig::default().with_day_zone(crate::config::DayZone::Utc);
        let mut session = Session::new(config).unwrap();
        let data = "timestamp,latitude,longitude,word\n2024-01-01,45.0,9.0,pizza\n";
        assert_eq!(session.ingest_csv(data.as_bytes()).unwrap(), 1);
        assert!(session.composer().store().is_empty());
        session.settle().unwrap();
        assert_eq!(session.composer().store().len(), 1);
        assert_eq!(session.timeline().days()[0].value, 1);
    }
}
