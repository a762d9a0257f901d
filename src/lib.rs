//! Linked-view filtering and aggregation over geo-tagged, timestamped,
//! word-tagged events.
//!
//! A [`Session`] owns one dataset and three linked views: a hex-bin
//! [`MapView`], a per-day [`TimelineView`] and a word-count [`LexiconView`].
//! Each view turns its raw selection into a predicate of the one kind it
//! owns; the [`FilterComposer`] ANDs the latest predicate of every kind and
//! every view recomputes its buckets over the rows that pass.
//!
//! ```
//! use frustum::{EngineConfig, Row, Selection, Session, ViewKind};
//!
//! let mut session = Session::new(EngineConfig::default()).unwrap();
//! session.ingest(vec![
//!     Row::new(Some(1_704_067_200_000), 45.0, 9.0, "pizza"),
//!     Row::new(Some(1_704_153_600_000), 41.9, 12.5, "mare"),
//! ]);
//! session.select(ViewKind::Lexicon, Selection::words(["pizza"]));
//! session.settle().unwrap();
//!
//! assert_eq!(session.composer().filtered(), &[0]);
//! assert_eq!(session.lexicon().labels(), vec!["pizza (1)"]);
//! ```

pub mod aggregate;
pub mod composer;
pub mod config;
pub mod error;
pub mod ingest;
pub mod predicate;
pub mod projection;
pub mod relay;
pub mod row;
pub mod session;
pub mod store;
pub mod throttle;
pub mod translate;
pub mod view;
#[cfg(feature = "widgets")]
pub mod widgets;

pub use aggregate::{AggregationKey, Bucket, Counter};
pub use composer::FilterComposer;
pub use config::{DayZone, EngineConfig};
pub use error::{Error, Result};
pub use predicate::{
    Filter, LexicalPredicate, PartialFilter, Predicate, PredicateKind, SpatialPredicate,
    TemporalPredicate,
};
pub use projection::{Equirectangular, GeoBounds, Projection};
pub use relay::{Event, Origin, Relay, Subscription};
pub use row::{Row, RowId, Schema};
pub use session::{Session, SessionReadGuard, SessionWriteGuard, SharedSession};
pub use translate::{PixelRect, TimeScale};
pub use view::{LexiconView, LinkedView, MapView, Selection, TimelineView, ViewKind};
