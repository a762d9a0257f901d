use egui::{vec2, Pos2, Rect, Response, Sense, Shape, Stroke, StrokeKind, Ui, Widget};

use super::style::ChartStyle;
use crate::aggregate::HexBins;
use crate::translate::PixelRect;
use crate::view::MapView;

/// Hex-bin map with a rectangular brush.
///
/// The widget is a scaled copy of the view's screen space: the view's extent
/// is fitted to the available width, and brushes are reported back in view
/// pixels.
#[must_use = "You should put this widget in a ui with `ui.add(widget);`"]
pub struct HexMap<'a> {
    bins: &'a HexBins,
    extent: [[f64; 2]; 2],
    brush: &'a mut Option<PixelRect>,
    desired_width: Option<f32>,
    style: Option<ChartStyle>,
}

impl<'a> HexMap<'a> {
    pub fn new(view: &'a MapView, brush: &'a mut Option<PixelRect>) -> Self {
        Self {
            bins: view.bins(),
            extent: view.extent(),
            brush,
            desired_width: None,
            style: None,
        }
    }

    pub fn desired_width(mut self, desired_width: f32) -> Self {
        self.desired_width = Some(desired_width);
        self
    }

    pub fn style(mut self, style: ChartStyle) -> Self {
        self.style = Some(style);
        self
    }
}

/// Uniform scale between view pixels and widget points.
struct Frame {
    origin: Pos2,
    zoom: f32,
}

impl Frame {
    fn to_screen(&self, [x, y]: [f64; 2]) -> Pos2 {
        self.origin + vec2(x as f32, y as f32) * self.zoom
    }

    fn to_view(&self, pos: Pos2) -> [f64; 2] {
        let local = (pos - self.origin) / self.zoom;
        [local.x as f64, local.y as f64]
    }
}

impl Widget for HexMap<'_> {
    fn ui(self, ui: &mut Ui) -> Response {
        let HexMap {
            bins,
            extent,
            brush,
            desired_width,
            style,
        } = self;

        let style = style.unwrap_or_else(|| ChartStyle::from(ui.style().as_ref()));
        let desired_width = desired_width.unwrap_or_else(|| ui.available_width().max(128.0));
        let [_, [right, bottom]] = extent;
        let zoom = if right > 0.0 { desired_width / right as f32 } else { 1.0 };
        let (rect, mut response) = ui.allocate_exact_size(
            vec2(desired_width, (bottom as f32 * zoom).max(16.0)),
            Sense::click_and_drag(),
        );
        if !ui.is_rect_visible(rect) {
            return response;
        }
        let frame = Frame {
            origin: rect.min,
            zoom,
        };

        if let Some(origin) = ui.input(|input| input.pointer.press_origin()) {
            if response.dragged() && rect.contains(origin) {
                if let Some(pointer) = response.interact_pointer_pos() {
                    let pointer = rect.clamp(pointer);
                    *brush = Some(PixelRect::new(frame.to_view(origin), frame.to_view(pointer)));
                    response.mark_changed();
                }
            }
        }
        if response.clicked() && brush.is_some() {
            *brush = None;
            response.mark_changed();
        }

        let painter = ui.painter().with_clip_rect(rect);
        painter.rect_stroke(rect, 0.0, Stroke::new(1.0, style.outline), StrokeKind::Inside);

        let max = bins.max.max(1) as f32;
        let outline = Stroke::new(0.5, style.grid);
        for bucket in &bins.buckets {
            let corners = bins
                .grid
                .corners(bucket.key)
                .iter()
                .map(|&corner| frame.to_screen(corner))
                .collect();
            let fill = style.ink.gamma_multiply(bucket.value as f32 / max);
            painter.add(Shape::convex_polygon(corners, fill, outline));
        }

        if let Some(selection) = *brush {
            let brush_rect = Rect::from_min_max(
                frame.to_screen(selection.top_left),
                frame.to_screen(selection.bottom_right),
            );
            painter.rect_filled(brush_rect, 0.0, style.brush);
            painter.rect_stroke(brush_rect, 0.0, Stroke::new(1.0, style.accent), StrokeKind::Inside);
        }

        if let Some(hover) = response.hover_pos() {
            let cell = bins.grid.cell(frame.to_view(hover));
            if let Some(bucket) = bins.buckets.iter().find(|bucket| bucket.key == cell) {
                let center = frame.to_screen(bins.grid.center(cell));
                painter.circle_stroke(center, 2.0, Stroke::new(1.0, style.accent));
                response = response.on_hover_text(format!("{}", bucket.value));
            }
        }

        response
    }
}
