use std::collections::BTreeSet;
use std::sync::Arc;

use egui::{vec2, Sense, Ui};

use super::style::{paint_hatching, ChartStyle};
use crate::aggregate::words::label;
use crate::aggregate::WordBucket;
use crate::view::LexiconView;

/// Selectable word list with a hatched bar per word.
pub struct WordList<'a> {
    words: &'a [WordBucket],
    selected: &'a BTreeSet<Arc<str>>,
    max_rows: usize,
    bar_width: f32,
    style: Option<ChartStyle>,
}

impl<'a> WordList<'a> {
    pub fn new(view: &'a LexiconView) -> Self {
        Self {
            words: view.words(),
            selected: view.selected(),
            max_rows: 30,
            bar_width: 60.0,
            style: None,
        }
    }

    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn bar_width(mut self, bar_width: f32) -> Self {
        self.bar_width = bar_width.max(0.0);
        self
    }

    pub fn style(mut self, style: ChartStyle) -> Self {
        self.style = Some(style);
        self
    }

    /// Draw the list. Returns the word the user clicked, if any; pass it to
    /// [`LexiconView::toggle`] to get the new selection.
    pub fn show(self, ui: &mut Ui) -> Option<Arc<str>> {
        let style = self
            .style
            .unwrap_or_else(|| ChartStyle::from(ui.style().as_ref()));
        let max_value = self.words.iter().map(|bucket| bucket.value).max().unwrap_or(0).max(1);
        let row_height = ui.spacing().interact_size.y;

        let mut clicked = None;
        for bucket in self.words.iter().take(self.max_rows) {
            ui.horizontal(|ui| {
                let frac = bucket.value as f32 / max_value as f32;
                let (rect, _) =
                    ui.allocate_exact_size(vec2(self.bar_width, row_height), Sense::hover());
                let bar = egui::Rect::from_min_size(
                    rect.right_top() - vec2(self.bar_width * frac, 0.0),
                    vec2(self.bar_width * frac, row_height),
                )
                .shrink2(vec2(0.0, 3.0));
                if bar.is_positive() {
                    paint_hatching(&ui.painter().with_clip_rect(bar), bar, style.ink);
                }

                let selected = self.selected.contains(&bucket.key);
                if ui.selectable_label(selected, label(bucket)).clicked() {
                    clicked = Some(Arc::clone(&bucket.key));
                }
            });
        }
        if self.words.len() > self.max_rows {
            ui.weak(format!("… {} more", self.words.len() - self.max_rows));
        }
        clicked
    }
}
