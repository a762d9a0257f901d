//! Raw view selections to predicates.
//!
//! `None` (or no words) always translates to the neutral predicate of the
//! kind: clearing a selection means "no constraint".

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::predicate::{LexicalPredicate, SpatialPredicate, TemporalPredicate};
use crate::projection::{GeoBounds, Projection};

/// Screen rectangle; `y` grows downwards.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PixelRect {
    pub top_left: [f64; 2],
    pub bottom_right: [f64; 2],
}

impl PixelRect {
    /// Rectangle spanned by two opposite corners, in any order.
    pub fn new(a: [f64; 2], b: [f64; 2]) -> Self {
        Self {
            top_left: [a[0].min(b[0]), a[1].min(b[1])],
            bottom_right: [a[0].max(b[0]), a[1].max(b[1])],
        }
    }

    pub fn contains(&self, [x, y]: [f64; 2]) -> bool {
        x >= self.top_left[0]
            && x <= self.bottom_right[0]
            && y >= self.top_left[1]
            && y <= self.bottom_right[1]
    }
}

/// Geographic box under a screen rectangle.
///
/// The top edge of the rectangle becomes the northern bound, since screen `y`
/// and latitude run in opposite directions.
pub fn spatial(rect: Option<PixelRect>, projection: &dyn Projection) -> Result<SpatialPredicate> {
    let Some(rect) = rect else {
        return Ok(SpatialPredicate::All);
    };
    let rect = PixelRect::new(rect.top_left, rect.bottom_right);
    let invert = |[x, y]: [f64; 2]| projection.invert([x, y]).ok_or(Error::Projection { x, y });
    let [west, north] = invert(rect.top_left)?;
    let [east, south] = invert(rect.bottom_right)?;
    Ok(SpatialPredicate::Within(GeoBounds {
        west: west.min(east),
        east: west.max(east),
        south: south.min(north),
        north: south.max(north),
    }))
}

/// Inclusive range between two epoch-millisecond boundaries.
pub fn temporal(span: Option<[i64; 2]>) -> TemporalPredicate {
    match span {
        Some([a, b]) => TemporalPredicate::between(a, b),
        None => TemporalPredicate::All,
    }
}

/// A pixel interval on the timeline, inverted through `scale`.
pub fn timeline(interval: Option<[f64; 2]>, scale: &TimeScale) -> TemporalPredicate {
    temporal(interval.map(|interval| scale.invert_interval(interval)))
}

pub fn lexical<I, S>(words: I) -> LexicalPredicate
where
    I: IntoIterator<Item = S>,
    S: Into<Arc<str>>,
{
    LexicalPredicate::words(words)
}

/// Linear map between a time domain (epoch ms) and a pixel range.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeScale {
    domain: [i64; 2],
    range: [f64; 2],
}

impl TimeScale {
    pub fn new(domain: [i64; 2], range: [f64; 2]) -> Self {
        Self { domain, range }
    }

    pub fn domain(&self) -> [i64; 2] {
        self.domain
    }

    pub fn range(&self) -> [f64; 2] {
        self.range
    }

    pub fn with_domain(self, domain: [i64; 2]) -> Self {
        Self { domain, ..self }
    }

    pub fn scale(&self, time: i64) -> f64 {
        let [d0, d1] = self.domain;
        let [r0, r1] = self.range;
        if d0 == d1 {
            return (r0 + r1) / 2.0;
        }
        let offset = (i128::from(time) - i128::from(d0)) as f64;
        r0 + offset / span(d0, d1) * (r1 - r0)
    }

    /// Saturates at the ends of the `i64` range.
    pub fn invert(&self, pixel: f64) -> i64 {
        let [d0, d1] = self.domain;
        let [r0, r1] = self.range;
        if d0 == d1 || r0 == r1 {
            return d0;
        }
        let t = (pixel - r0) / (r1 - r0);
        let offset = (t * span(d0, d1)).round() as i128;
        (i128::from(d0) + offset).clamp(i128::from(i64::MIN), i128::from(i64::MAX)) as i64
    }

    /// Both ends inverted, earliest first.
    pub fn invert_interval(&self, [a, b]: [f64; 2]) -> [i64; 2] {
        let (a, b) = (self.invert(a), self.invert(b));
        [a.min(b), a.max(b)]
    }
}

/// Width of a time domain; wider than `i64` can hold for extreme epochs.
fn span(d0: i64, d1: i64) -> f64 {
    (i128::from(d1) - i128::from(d0)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::Predicate;
    use crate::projection::Equirectangular;
    use crate::row::Row;
    use approx::assert_relative_eq;

    #[test]
    fn top_edge_becomes_north() {
        let projection = Equirectangular::new(100.0, [500.0, 300.0]);
        let rect = PixelRect::new([400.0, 200.0], [600.0, 350.0]);
        let SpatialPredicate::Within(bounds) = spatial(Some(rect), &projection).unwrap() else {
            panic!("expected bounds");
        };
        assert!(bounds.north > bounds.south);
        assert_relative_eq!(bounds.north, 1.0f64.to_degrees(), epsilon = 1e-9);
        assert_relative_eq!(bounds.south, (-0.5f64).to_degrees(), epsilon = 1e-9);
        assert_relative_eq!(bounds.west, (-1.0f64).to_degrees(), epsilon = 1e-9);
        assert_relative_eq!(bounds.east, 1.0f64.to_degrees(), epsilon = 1e-9);
    }

    #[test]
    fn corner_order_does_not_matter() {
        let projection = Equirectangular::default();
        let a = spatial(Some(PixelRect::new([10.0, 80.0], [90.0, 20.0])), &projection).unwrap();
        let b = spatial(
            Some(PixelRect {
                top_left: [90.0, 20.0],
                bottom_right: [10.0, 80.0],
            }),
            &projection,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn selected_region_contains_projected_rows() {
        let projection = Equirectangular::default();
        let inside = Row::new(None, 10.0, 20.0, "a");
        let outside = Row::new(None, -30.0, 20.0, "a");
        let [x, y] = projection.project(20.0, 10.0).unwrap();
        let rect = PixelRect::new([x - 5.0, y - 5.0], [x + 5.0, y + 5.0]);
        let predicate = spatial(Some(rect), &projection).unwrap();
        assert!(predicate.test(&inside));
        assert!(!predicate.test(&outside));
    }

    #[test]
    fn cleared_selections_are_neutral() {
        assert_eq!(spatial(None, &Equirectangular::default()).unwrap(), SpatialPredicate::All);
        assert_eq!(temporal(None), TemporalPredicate::All);
        assert_eq!(lexical(Vec::<String>::new()), LexicalPredicate::All);
    }

    #[test]
    fn time_scale_round_trips_pixels() {
        let scale = TimeScale::new([1_000, 101_000], [0.0, 500.0]);
        assert_eq!(scale.invert(0.0), 1_000);
        assert_eq!(scale.invert(500.0), 101_000);
        assert_eq!(scale.invert(scale.scale(51_000)), 51_000);
        assert_eq!(scale.invert_interval([400.0, 100.0]), [21_000, 81_000]);
        assert_eq!(
            timeline(Some([100.0, 400.0]), &scale),
            TemporalPredicate::Between {
                start: 21_000,
                end: 81_000
            }
        );
    }

    #[test]
    fn time_scale_spans_the_whole_epoch_range() {
        let scale = TimeScale::new([i64::MIN, i64::MAX], [0.0, 500.0]);
        assert_eq!(scale.invert(0.0), i64::MIN);
        assert_eq!(scale.invert(250.0), 0);
        assert_eq!(scale.invert(500.0), i64::MAX);
        assert_eq!(scale.invert(1_000.0), i64::MAX);
        assert_eq!(scale.invert(-1_000.0), i64::MIN);
        assert_relative_eq!(scale.scale(i64::MIN), 0.0);
        assert_relative_eq!(scale.scale(i64::MAX), 500.0);
        assert_relative_eq!(scale.scale(0), 250.0);
        assert_eq!(scale.invert_interval([450.0, 0.0])[0], i64::MIN);
    }
}
