//! egui widgets for the three linked views.
//!
//! Each widget draws what its view last computed and edits a brush in
//! place, marking the response as changed when the user moved it. Feeding
//! the brush back into the session is up to the caller:
//!
//! ```ignore
//! let response = ui.add(DayHistogram::new(timeline, &mut brush));
//! if response.changed() {
//!     session.gesture(ViewKind::Timeline, Selection::Span(brush), Instant::now());
//! }
//! if response.drag_stopped() {
//!     session.gesture_end(ViewKind::Timeline);
//! }
//! ```

mod hex_map;
mod histogram;
mod style;
mod word_list;

pub use hex_map::HexMap;
pub use histogram::DayHistogram;
pub use style::ChartStyle;
pub use word_list::WordList;
