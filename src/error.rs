use thiserror::Error;

use crate::predicate::PredicateKind;
use crate::view::ViewKind;

#[derive(Error, Debug)]
pub enum Error {
    /// The aggregation key names a grouping field the schema does not have.
    #[error("unknown grouping field `{0}`")]
    UnknownKeyField(String),

    #[error("row {row} has {found} grouping keys, schema declares {expected}")]
    SchemaMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    /// A view tried to write a predicate kind owned by another view.
    #[error("{view:?} view may not write the {kind:?} predicate")]
    ForeignPredicate { view: ViewKind, kind: PredicateKind },

    #[error("selection does not apply to the {0:?} view")]
    SelectionMismatch(ViewKind),

    #[error("cannot invert screen point ({x}, {y})")]
    Projection { x: f64, y: f64 },

    /// A derived facet was computed for an older dataset.
    #[error("facet derived from generation {facet}, store is at generation {store}")]
    StaleFacet { facet: u64, store: u64 },

    #[error("missing column `{0}`")]
    MissingColumn(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
