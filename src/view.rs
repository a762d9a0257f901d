//! The three linked views.
//!
//! A view owns exactly one predicate kind, its view-local facets and the
//! buckets it last computed. It never touches the composer's state: raw
//! selections go out through the relay, the session translates them and hands
//! the selection back to the view once the composer has taken the predicate.
//! The view picks up the new filtered rows on its next
//! [`poll`](LinkedView::poll).

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, debug_span};

use crate::aggregate::{aggregate_days, aggregate_hexbins, aggregate_words, words};
use crate::aggregate::{DayBucket, HexBins, HexGrid, WordBucket};
use crate::composer::FilterComposer;
use crate::config::{DayZone, MapConfig, TimelineConfig};
use crate::error::{Error, Result};
use crate::predicate::{PartialFilter, PredicateKind};
use crate::projection::{Equirectangular, GeoBounds, Projection};
use crate::relay::{Event, Relay, Subscription};
use crate::store::{day_labels, screen_points, DayLabels, ScreenPoints};
use crate::translate::{self, PixelRect, TimeScale};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    Map,
    Timeline,
    Lexicon,
}

impl ViewKind {
    pub const ALL: [ViewKind; 3] = [ViewKind::Map, ViewKind::Timeline, ViewKind::Lexicon];

    /// The only predicate kind this view may write.
    pub fn owns(self) -> PredicateKind {
        match self {
            ViewKind::Map => PredicateKind::Spatial,
            ViewKind::Timeline => PredicateKind::Temporal,
            ViewKind::Lexicon => PredicateKind::Lexical,
        }
    }
}

/// A raw user selection, before translation. `None` and an empty word list
/// clear the selection.
#[derive(Clone, Debug, PartialEq)]
pub enum Selection {
    /// Map brush in screen pixels.
    Rect(Option<PixelRect>),
    /// Timeline brush in screen pixels.
    Interval(Option<[f64; 2]>),
    /// Timeline range in epoch milliseconds.
    Span(Option<[i64; 2]>),
    Words(Vec<Arc<str>>),
}

impl Selection {
    pub fn words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        Selection::Words(words.into_iter().map(Into::into).collect())
    }
}

pub trait LinkedView {
    fn kind(&self) -> ViewKind;

    fn subscription(&self) -> &Subscription;

    /// Predicate for `selection`, as a partial filter holding only the kind
    /// this view owns.
    fn translate(&self, selection: &Selection) -> Result<PartialFilter>;

    /// Remember `selection` as the one currently drawn.
    fn accept(&mut self, selection: Selection) -> Result<()>;

    fn clear_selection(&mut self);

    /// Whether the buckets lag behind the composer.
    fn is_stale(&self, composer: &FilterComposer) -> bool;

    /// Rebuild facets where needed and recompute the buckets.
    fn refresh(&mut self, composer: &FilterComposer) -> Result<()>;

    /// Drop the drawn selection if another origin replaced this view's
    /// predicate, then refresh if anything moved. Returns whether the buckets
    /// were recomputed.
    fn poll(&mut self, composer: &FilterComposer) -> Result<bool> {
        let kind = self.kind();
        for event in self.subscription().drain() {
            if let Event::FilterChanged { origin, change } = event {
                if change.contains(kind.owns()) {
                    debug!(view = ?kind, ?origin, "predicate replaced elsewhere, dropping selection");
                    self.clear_selection();
                }
            }
        }
        if !self.is_stale(composer) {
            return Ok(false);
        }
        self.refresh(composer)?;
        Ok(true)
    }
}

/// Store generation and composer revision the buckets were computed at.
type Seen = Option<(u64, u64)>;

fn seen(composer: &FilterComposer) -> Seen {
    Some((composer.store().generation(), composer.revision()))
}

/// Hex-bin map over projected row positions.
pub struct MapView {
    subscription: Subscription,
    extent: [[f64; 2]; 2],
    projection: Arc<dyn Projection>,
    fit: bool,
    reproject: bool,
    grid: HexGrid,
    points: ScreenPoints,
    selection: Option<PixelRect>,
    bins: HexBins,
    seen: Seen,
}

impl MapView {
    /// A map that refits an equirectangular projection to every new dataset.
    pub fn new(relay: &Relay, config: &MapConfig) -> Result<Self> {
        let grid = HexGrid::new(config.hex_radius, config.viewport)?;
        Ok(Self {
            subscription: relay.subscribe(Some(ViewKind::Map.into())),
            extent: config.viewport,
            projection: Arc::new(Equirectangular::default()),
            fit: true,
            reproject: true,
            grid,
            points: ScreenPoints::default(),
            selection: None,
            bins: HexBins::empty(grid),
            seen: None,
        })
    }

    /// Use a fixed projection instead of refitting per dataset.
    pub fn with_projection(mut self, projection: Arc<dyn Projection>) -> Self {
        self.set_projection(projection);
        self
    }

    /// Drops the drawn brush, whose pixels no longer match the new projection.
    pub fn set_projection(&mut self, projection: Arc<dyn Projection>) {
        self.projection = projection;
        self.selection = None;
        self.fit = false;
        self.reproject = true;
        self.seen = None;
    }

    pub fn projection(&self) -> &dyn Projection {
        self.projection.as_ref()
    }

    pub fn extent(&self) -> [[f64; 2]; 2] {
        self.extent
    }

    pub fn grid(&self) -> &HexGrid {
        &self.grid
    }

    pub fn points(&self) -> &ScreenPoints {
        &self.points
    }

    pub fn selection(&self) -> Option<PixelRect> {
        self.selection
    }

    pub fn bins(&self) -> &HexBins {
        &self.bins
    }
}

impl LinkedView for MapView {
    fn kind(&self) -> ViewKind {
        ViewKind::Map
    }

    fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    fn translate(&self, selection: &Selection) -> Result<PartialFilter> {
        match selection {
            Selection::Rect(rect) => Ok(PartialFilter::spatial(translate::spatial(
                *rect,
                self.projection.as_ref(),
            )?)),
            _ => Err(Error::SelectionMismatch(ViewKind::Map)),
        }
    }

    fn accept(&mut self, selection: Selection) -> Result<()> {
        match selection {
            Selection::Rect(rect) => {
                self.selection = rect.map(|rect| PixelRect::new(rect.top_left, rect.bottom_right));
                Ok(())
            }
            _ => Err(Error::SelectionMismatch(ViewKind::Map)),
        }
    }

    fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn is_stale(&self, composer: &FilterComposer) -> bool {
        self.reproject || !self.points.is_current(composer.store()) || self.seen != seen(composer)
    }

    fn refresh(&mut self, composer: &FilterComposer) -> Result<()> {
        let store = composer.store();
        if self.reproject || !self.points.is_current(store) {
            let _span = debug_span!("project", rows = store.len()).entered();
            if self.fit {
                if let Some(bounds) = GeoBounds::of_rows(store.rows()) {
                    self.projection = Arc::new(Equirectangular::fit_extent(self.extent, bounds));
                    if self.selection.take().is_some() {
                        debug!("projection refitted, dropping brush");
                    }
                }
            }
            self.points = screen_points(store, self.projection.as_ref());
            self.reproject = false;
        }
        self.bins = aggregate_hexbins(
            store,
            &self.points,
            composer.filtered(),
            composer.counter(),
            self.grid,
        )?;
        self.seen = seen(composer);
        Ok(())
    }
}

impl std::fmt::Debug for MapView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapView")
            .field("grid", &self.grid)
            .field("selection", &self.selection)
            .field("cells", &self.bins.buckets.len())
            .field("max", &self.bins.max)
            .finish()
    }
}

/// Per-day histogram.
#[derive(Debug)]
pub struct TimelineView {
    subscription: Subscription,
    zone: DayZone,
    scale: TimeScale,
    labels: DayLabels,
    /// Current brush, already inverted to epoch milliseconds.
    selection: Option<[i64; 2]>,
    days: Vec<DayBucket>,
    seen: Seen,
}

impl TimelineView {
    pub fn new(relay: &Relay, config: &TimelineConfig, zone: DayZone) -> Self {
        Self {
            subscription: relay.subscribe(Some(ViewKind::Timeline.into())),
            zone,
            scale: TimeScale::new([0, 0], config.range),
            labels: DayLabels::default(),
            selection: None,
            days: Vec::new(),
            seen: None,
        }
    }

    pub fn zone(&self) -> DayZone {
        self.zone
    }

    /// Maps the dataset's time extent onto the plot range.
    pub fn scale(&self) -> &TimeScale {
        &self.scale
    }

    pub fn selection(&self) -> Option<[i64; 2]> {
        self.selection
    }

    pub fn days(&self) -> &[DayBucket] {
        &self.days
    }

    fn span(&self, selection: &Selection) -> Result<Option<[i64; 2]>> {
        match selection {
            Selection::Interval(interval) => {
                Ok(interval.map(|interval| self.scale.invert_interval(interval)))
            }
            Selection::Span(span) => Ok(span.map(|[a, b]| [a.min(b), a.max(b)])),
            _ => Err(Error::SelectionMismatch(ViewKind::Timeline)),
        }
    }
}

impl LinkedView for TimelineView {
    fn kind(&self) -> ViewKind {
        ViewKind::Timeline
    }

    fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    fn translate(&self, selection: &Selection) -> Result<PartialFilter> {
        let predicate = match selection {
            Selection::Interval(interval) => translate::timeline(*interval, &self.scale),
            other => translate::temporal(self.span(other)?),
        };
        Ok(PartialFilter::temporal(predicate))
    }

    fn accept(&mut self, selection: Selection) -> Result<()> {
        self.selection = self.span(&selection)?;
        Ok(())
    }

    fn clear_selection(&mut self) {
        self.selection = None;
    }

    fn is_stale(&self, composer: &FilterComposer) -> bool {
        !self.labels.is_current(composer.store()) || self.seen != seen(composer)
    }

    fn refresh(&mut self, composer: &FilterComposer) -> Result<()> {
        let store = composer.store();
        if !self.labels.is_current(store) {
            let _span = debug_span!("day_labels", rows = store.len()).entered();
            self.labels = day_labels(store, self.zone);
            self.scale = self.scale.with_domain(store.time_extent().unwrap_or([0, 0]));
        }
        self.days = aggregate_days(store, &self.labels, composer.filtered(), composer.counter())?;
        self.seen = seen(composer);
        Ok(())
    }
}

/// Word list, most frequent first.
#[derive(Debug)]
pub struct LexiconView {
    subscription: Subscription,
    selected: BTreeSet<Arc<str>>,
    words: Vec<WordBucket>,
    seen: Seen,
}

impl LexiconView {
    pub fn new(relay: &Relay) -> Self {
        Self {
            subscription: relay.subscribe(Some(ViewKind::Lexicon.into())),
            selected: BTreeSet::new(),
            words: Vec::new(),
            seen: None,
        }
    }

    pub fn words(&self) -> &[WordBucket] {
        &self.words
    }

    /// `"word (count)"` for every bucket, in display order.
    pub fn labels(&self) -> Vec<String> {
        self.words.iter().map(words::label).collect()
    }

    pub fn selected(&self) -> &BTreeSet<Arc<str>> {
        &self.selected
    }

    pub fn is_selected(&self, word: &str) -> bool {
        self.selected.contains(word)
    }

    /// The selection with `word` added or removed.
    pub fn toggle(&self, word: &str) -> Selection {
        let mut selected = self.selected.clone();
        if !selected.remove(word) {
            selected.insert(Arc::from(word));
        }
        Selection::Words(selected.into_iter().collect())
    }
}

impl LinkedView for LexiconView {
    fn kind(&self) -> ViewKind {
        ViewKind::Lexicon
    }

    fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    fn translate(&self, selection: &Selection) -> Result<PartialFilter> {
        match selection {
            Selection::Words(words) => Ok(PartialFilter::lexical(translate::lexical(
                words.iter().cloned(),
            ))),
            _ => Err(Error::SelectionMismatch(ViewKind::Lexicon)),
        }
    }

    fn accept(&mut self, selection: Selection) -> Result<()> {
        match selection {
            Selection::Words(words) => {
                self.selected = words.into_iter().collect();
                Ok(())
            }
            _ => Err(Error::SelectionMismatch(ViewKind::Lexicon)),
        }
    }

    fn clear_selection(&mut self) {
        self.selected.clear();
    }

    fn is_stale(&self, composer: &FilterComposer) -> bool {
        self.seen != seen(composer)
    }

    fn refresh(&mut self, composer: &FilterComposer) -> Result<()> {
        self.words = aggregate_words(composer.store(), composer.filtered(), composer.counter())?;
        self.seen = seen(composer);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{LexicalPredicate, TemporalPredicate};
    use crate::relay::Origin;
    use crate::row::{Row, Schema};

    const DAY: i64 = 86_400_000;
    const JAN1: i64 = 1_704_067_200_000;

    fn composer(relay: &Relay) -> FilterComposer {
        let mut composer = FilterComposer::new(Schema::default(), relay.clone());
        composer
            .replace(
                vec![
                    Row::new(Some(JAN1), 45.0, 9.0, "pizza"),
                    Row::new(Some(JAN1 + DAY), 41.9, 12.5, "mare"),
                    Row::new(Some(JAN1 + 2 * DAY), 40.8, 14.2, "pizza"),
                ]
                .into(),
            )
            .unwrap();
        composer
    }

    #[test]
    fn views_own_one_kind_each() {
        assert_eq!(ViewKind::Map.owns(), PredicateKind::Spatial);
        assert_eq!(ViewKind::Timeline.owns(), PredicateKind::Temporal);
        assert_eq!(ViewKind::Lexicon.owns(), PredicateKind::Lexical);
    }

    #[test]
    fn wrong_selection_kind_is_refused() {
        let relay = Relay::new();
        let lexicon = LexiconView::new(&relay);
        assert!(matches!(
            lexicon.translate(&Selection::Span(None)),
            Err(Error::SelectionMismatch(ViewKind::Lexicon))
        ));
        let map = MapView::new(&relay, &MapConfig::default()).unwrap();
        assert!(matches!(
            map.translate(&Selection::words(["a"])),
            Err(Error::SelectionMismatch(ViewKind::Map))
        ));
    }

    #[test]
    fn timeline_brush_inverts_through_data_extent() {
        let relay = Relay::new();
        let composer = composer(&relay);
        let config = TimelineConfig { range: [0.0, 200.0] };
        let mut timeline = TimelineView::new(&relay, &config, DayZone::Utc);
        assert!(timeline.poll(&composer).unwrap());
        assert_eq!(timeline.scale().domain(), [JAN1, JAN1 + 2 * DAY]);

        let change = timeline.translate(&Selection::Interval(Some([100.0, 0.0]))).unwrap();
        assert_eq!(
            change.temporal,
            Some(TemporalPredicate::Between {
                start: JAN1,
                end: JAN1 + DAY
            })
        );
        assert_eq!(timeline.days().len(), 3);
    }

    #[test]
    fn poll_refreshes_only_when_composer_moved() {
        let relay = Relay::new();
        let mut composer = composer(&relay);
        let mut lexicon = LexiconView::new(&relay);
        assert!(lexicon.poll(&composer).unwrap());
        assert!(!lexicon.poll(&composer).unwrap());
        assert_eq!(lexicon.labels(), vec!["pizza (2)", "mare (1)"]);

        composer
            .update(
                ViewKind::Timeline.into(),
                PartialFilter::temporal(TemporalPredicate::between(JAN1, JAN1)),
            )
            .unwrap();
        assert!(lexicon.poll(&composer).unwrap());
        assert_eq!(lexicon.labels(), vec!["pizza (1)"]);
    }

    #[test]
    fn external_write_drops_own_selection() {
        let relay = Relay::new();
        let mut composer = composer(&relay);
        let mut lexicon = LexiconView::new(&relay);
        lexicon.accept(Selection::words(["mare"])).unwrap();
        relay.publish(Event::SelectionChanged {
            view: ViewKind::Lexicon,
            selection: Selection::words(["pizza"]),
        });
        lexicon.poll(&composer).unwrap();
        assert!(lexicon.is_selected("mare"));
        assert!(!lexicon.is_selected("pizza"));

        composer
            .update(
                Origin::external("script"),
                PartialFilter::lexical(LexicalPredicate::words(["pizza"])),
            )
            .unwrap();
        lexicon.poll(&composer).unwrap();
        assert!(lexicon.selected().is_empty());
    }

    #[test]
    fn toggle_adds_and_removes() {
        let relay = Relay::new();
        let mut lexicon = LexiconView::new(&relay);
        assert_eq!(lexicon.toggle("a"), Selection::words(["a"]));
        lexicon.accept(Selection::words(["a", "b"])).unwrap();
        assert_eq!(lexicon.toggle("a"), Selection::words(["b"]));
        assert_eq!(lexicon.toggle("c"), Selection::words(["a", "b", "c"]));
    }

    #[test]
    fn map_bins_every_positioned_row() {
        let relay = Relay::new();
        let composer = composer(&relay);
        let mut map = MapView::new(&relay, &MapConfig::default()).unwrap();
        map.poll(&composer).unwrap();
        assert_eq!(map.bins().total(), 3);
        assert!(map.bins().max >= 1);
    }

    #[test]
    fn refit_drops_brush_drawn_in_old_pixels() {
        let relay = Relay::new();
        let mut composer = composer(&relay);
        let mut map = MapView::new(&relay, &MapConfig::default()).unwrap();
        map.poll(&composer).unwrap();
        map.accept(Selection::Rect(Some(PixelRect::new([10.0, 10.0], [50.0, 50.0]))))
            .unwrap();
        assert!(map.selection().is_some());

        map.poll(&composer).unwrap();
        assert!(map.selection().is_some());

        composer
            .replace(vec![Row::new(Some(JAN1), -33.9, 151.2, "surf")].into())
            .unwrap();
        map.poll(&composer).unwrap();
        assert_eq!(map.selection(), None);

        map.accept(Selection::Rect(Some(PixelRect::new([0.0, 0.0], [5.0, 5.0]))))
            .unwrap();
        map.set_projection(Arc::new(Equirectangular::default()));
        assert_eq!(map.selection(), None);
    }
}
