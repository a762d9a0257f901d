//! Per-view predicates and their composition.
//!
//! Each view owns one [`PredicateKind`]. The neutral variant (`All`) of every
//! kind passes every row, including rows with malformed fields; any other
//! variant compares values and rejects malformed ones.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::projection::GeoBounds;
use crate::row::Row;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PredicateKind {
    Spatial,
    Temporal,
    Lexical,
}

impl PredicateKind {
    pub const ALL: [PredicateKind; 3] = [
        PredicateKind::Spatial,
        PredicateKind::Temporal,
        PredicateKind::Lexical,
    ];
}

pub trait Predicate {
    fn test(&self, row: &Row) -> bool;

    fn is_neutral(&self) -> bool;
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum SpatialPredicate {
    #[default]
    All,
    Within(GeoBounds),
}

impl Predicate for SpatialPredicate {
    fn test(&self, row: &Row) -> bool {
        match self {
            SpatialPredicate::All => true,
            SpatialPredicate::Within(bounds) => bounds.contains(row.latitude, row.longitude),
        }
    }

    fn is_neutral(&self) -> bool {
        matches!(self, SpatialPredicate::All)
    }
}

/// Inclusive range of epoch milliseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TemporalPredicate {
    #[default]
    All,
    Between { start: i64, end: i64 },
}

impl TemporalPredicate {
    pub fn between(a: i64, b: i64) -> Self {
        TemporalPredicate::Between {
            start: a.min(b),
            end: a.max(b),
        }
    }
}

impl Predicate for TemporalPredicate {
    fn test(&self, row: &Row) -> bool {
        match (self, row.time) {
            (TemporalPredicate::All, _) => true,
            (TemporalPredicate::Between { start, end }, Some(time)) => {
                time >= *start && time <= *end
            }
            (TemporalPredicate::Between { .. }, None) => false,
        }
    }

    fn is_neutral(&self) -> bool {
        matches!(self, TemporalPredicate::All)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum LexicalPredicate {
    #[default]
    All,
    Words(Arc<BTreeSet<Arc<str>>>),
}

impl LexicalPredicate {
    /// Membership in `words`; no words at all means no constraint.
    pub fn words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let set: BTreeSet<Arc<str>> = words.into_iter().map(Into::into).collect();
        if set.is_empty() {
            LexicalPredicate::All
        } else {
            LexicalPredicate::Words(Arc::new(set))
        }
    }
}

impl Predicate for LexicalPredicate {
    fn test(&self, row: &Row) -> bool {
        match self {
            LexicalPredicate::All => true,
            LexicalPredicate::Words(words) => words.contains(&row.word),
        }
    }

    fn is_neutral(&self) -> bool {
        matches!(self, LexicalPredicate::All)
    }
}

/// The conjunction of one predicate per kind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    pub spatial: SpatialPredicate,
    pub temporal: TemporalPredicate,
    pub lexical: LexicalPredicate,
}

impl Filter {
    pub fn is_neutral(&self) -> bool {
        self.spatial.is_neutral() && self.temporal.is_neutral() && self.lexical.is_neutral()
    }

    /// Replace the kinds present in `partial`, returning only those whose
    /// value actually changed.
    pub fn merge(&mut self, partial: PartialFilter) -> PartialFilter {
        let mut changed = PartialFilter::default();
        if let Some(spatial) = partial.spatial {
            if spatial != self.spatial {
                self.spatial = spatial;
                changed.spatial = Some(spatial);
            }
        }
        if let Some(temporal) = partial.temporal {
            if temporal != self.temporal {
                self.temporal = temporal;
                changed.temporal = Some(temporal);
            }
        }
        if let Some(lexical) = partial.lexical {
            if lexical != self.lexical {
                self.lexical = lexical.clone();
                changed.lexical = Some(lexical);
            }
        }
        changed
    }
}

impl Predicate for Filter {
    fn test(&self, row: &Row) -> bool {
        self.spatial.test(row) && self.temporal.test(row) && self.lexical.test(row)
    }

    fn is_neutral(&self) -> bool {
        Filter::is_neutral(self)
    }
}

/// Some subset of the three predicate kinds.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PartialFilter {
    pub spatial: Option<SpatialPredicate>,
    pub temporal: Option<TemporalPredicate>,
    pub lexical: Option<LexicalPredicate>,
}

impl PartialFilter {
    pub fn spatial(predicate: SpatialPredicate) -> Self {
        Self {
            spatial: Some(predicate),
            ..Self::default()
        }
    }

    pub fn temporal(predicate: TemporalPredicate) -> Self {
        Self {
            temporal: Some(predicate),
            ..Self::default()
        }
    }

    pub fn lexical(predicate: LexicalPredicate) -> Self {
        Self {
            lexical: Some(predicate),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kinds().next().is_none()
    }

    pub fn contains(&self, kind: PredicateKind) -> bool {
        match kind {
            PredicateKind::Spatial => self.spatial.is_some(),
            PredicateKind::Temporal => self.temporal.is_some(),
            PredicateKind::Lexical => self.lexical.is_some(),
        }
    }

    pub fn kinds(&self) -> impl Iterator<Item = PredicateKind> + '_ {
        PredicateKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}
