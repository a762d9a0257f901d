use egui::{pos2, vec2, Align2, Rect, Response, Sense, Stroke, StrokeKind, TextStyle, Ui, Widget};

use super::style::{paint_hatching, ChartStyle};
use crate::aggregate::days::label;
use crate::aggregate::DayBucket;
use crate::config::DayZone;
use crate::translate::TimeScale;
use crate::view::TimelineView;

const DAY: i64 = 86_400_000;

#[derive(Clone, Copy)]
struct CountScale {
    divisor: u64,
    suffix: &'static str,
}

impl CountScale {
    fn pick(max: u64) -> Self {
        if max >= 1_000_000_000 {
            Self {
                divisor: 1_000_000_000,
                suffix: "B",
            }
        } else if max >= 1_000_000 {
            Self {
                divisor: 1_000_000,
                suffix: "M",
            }
        } else if max >= 1_000 {
            Self {
                divisor: 1_000,
                suffix: "K",
            }
        } else {
            Self {
                divisor: 1,
                suffix: "",
            }
        }
    }

    fn format(self, value: u64) -> String {
        if value == 0 || self.divisor == 1 {
            return format!("{value}");
        }
        let scaled = value as f64 / self.divisor as f64;
        if scaled.fract().abs() < f64::EPSILON {
            format!("{}{}", scaled as u64, self.suffix)
        } else {
            format!("{scaled:.1}{}", self.suffix)
        }
    }
}

fn nice_decimal_step(max_value: u64, segments: u64) -> u64 {
    let segments = segments.max(1);
    let raw_step = max_value.div_ceil(segments).max(1);
    let magnitude = 10u64.pow(raw_step.ilog10());
    for mult in [1u64, 2, 5, 10] {
        let step = mult.saturating_mul(magnitude);
        if step >= raw_step {
            return step;
        }
    }
    10u64.saturating_mul(magnitude)
}

/// Per-day bars on a time axis, with a horizontal brush.
///
/// Dragging sets the brush to the dragged time span, a click clears it.
#[must_use = "You should put this widget in a ui with `ui.add(widget);`"]
pub struct DayHistogram<'a> {
    days: &'a [DayBucket],
    domain: [i64; 2],
    zone: DayZone,
    brush: &'a mut Option<[i64; 2]>,
    desired_width: Option<f32>,
    plot_height: f32,
    y_segments: u64,
    max_x_labels: usize,
    style: Option<ChartStyle>,
}

impl<'a> DayHistogram<'a> {
    pub fn new(view: &'a TimelineView, brush: &'a mut Option<[i64; 2]>) -> Self {
        Self {
            days: view.days(),
            domain: view.scale().domain(),
            zone: view.zone(),
            brush,
            desired_width: None,
            plot_height: 80.0,
            y_segments: 4,
            max_x_labels: 7,
            style: None,
        }
    }

    pub fn desired_width(mut self, desired_width: f32) -> Self {
        self.desired_width = Some(desired_width);
        self
    }

    pub fn plot_height(mut self, plot_height: f32) -> Self {
        self.plot_height = plot_height.max(16.0);
        self
    }

    pub fn y_segments(mut self, segments: u64) -> Self {
        self.y_segments = segments.max(1);
        self
    }

    pub fn max_x_labels(mut self, max_labels: usize) -> Self {
        self.max_x_labels = max_labels;
        self
    }

    pub fn style(mut self, style: ChartStyle) -> Self {
        self.style = Some(style);
        self
    }
}

impl Widget for DayHistogram<'_> {
    fn ui(self, ui: &mut Ui) -> Response {
        let DayHistogram {
            days,
            domain,
            zone,
            brush,
            desired_width,
            plot_height,
            y_segments,
            max_x_labels,
            style,
        } = self;

        let style = style.unwrap_or_else(|| ChartStyle::from(ui.style().as_ref()));
        let desired_width = desired_width.unwrap_or_else(|| ui.available_width().max(128.0));
        let font_id = TextStyle::Small.resolve(ui.style());
        let tick_len = 4.0;
        let tick_pad = 2.0;
        let text_height = ui.fonts_mut(|fonts| fonts.row_height(&font_id));
        let label_row_h = tick_len + tick_pad + text_height;

        let (outer_rect, mut response) = ui.allocate_exact_size(
            vec2(desired_width, plot_height + label_row_h),
            Sense::click_and_drag(),
        );
        if !ui.is_rect_visible(outer_rect) {
            return response;
        }

        let max_value = days.iter().map(|bucket| bucket.value).max().unwrap_or(0);
        let y_step = nice_decimal_step(max_value, y_segments);
        let y_max = y_step.saturating_mul(y_segments).max(1);
        let y_ticks: Vec<u64> = (0..=y_segments).map(|i| y_step.saturating_mul(i)).collect();
        let count_scale = CountScale::pick(y_max);

        let y_label_width = ui.fonts_mut(|fonts| {
            y_ticks
                .iter()
                .map(|&value| {
                    fonts
                        .layout_no_wrap(count_scale.format(value), font_id.clone(), style.ink)
                        .size()
                        .x
                })
                .fold(0.0, f32::max)
        });
        let y_axis_w = (y_label_width + 10.0).clamp(24.0, 80.0);
        let y_axis_pad = 6.0;

        let plot_rect = Rect::from_min_max(
            pos2(
                (outer_rect.left() + y_axis_w + y_axis_pad).min(outer_rect.right()),
                outer_rect.top(),
            ),
            pos2(outer_rect.right(), outer_rect.bottom() - label_row_h),
        );
        let plot_area = plot_rect.shrink(4.0);

        let painter = ui.painter().with_clip_rect(outer_rect);
        painter.rect_stroke(plot_rect, 0.0, Stroke::new(1.0, style.outline), StrokeKind::Inside);

        for &value in &y_ticks {
            let frac = (value as f64 / y_max as f64) as f32;
            let y = plot_area.bottom() - frac * plot_area.height();
            painter.line_segment(
                [pos2(plot_area.left(), y), pos2(plot_area.right(), y)],
                Stroke::new(1.0, style.grid),
            );
            painter.text(
                pos2(plot_rect.left() - 4.0, y),
                Align2::RIGHT_CENTER,
                count_scale.format(value),
                font_id.clone(),
                style.ink,
            );
        }

        if !plot_area.is_positive() {
            return response;
        }

        // The last day needs room for its own bar.
        let scale = TimeScale::new(
            [domain[0], domain[1].max(domain[0]).saturating_add(DAY)],
            [plot_area.left() as f64, plot_area.right() as f64],
        );

        if let Some(origin) = ui.input(|input| input.pointer.press_origin()) {
            if response.dragged() && plot_rect.contains(origin) {
                if let Some(pointer) = response.interact_pointer_pos() {
                    let x = pointer.x.clamp(plot_area.left(), plot_area.right());
                    *brush = Some(scale.invert_interval([origin.x as f64, x as f64]));
                    response.mark_changed();
                }
            }
        }
        if response.clicked() && brush.is_some() {
            *brush = None;
            response.mark_changed();
        }

        let gap = 1.0;
        for (i, bucket) in days.iter().enumerate() {
            let Some(start) = bucket
                .key
                .and_hms_opt(0, 0, 0)
                .and_then(|midnight| zone.millis(midnight))
            else {
                continue;
            };
            let frac = (bucket.value as f64 / y_max as f64) as f32;
            let bar_h = (frac * plot_area.height()).clamp(1.0, plot_area.height());
            let x0 = scale.scale(start) as f32;
            let x1 = (scale.scale(start.saturating_add(DAY)) as f32 - gap).max(x0 + 1.0);
            let bar_rect = Rect::from_min_max(
                pos2(x0, plot_area.bottom() - bar_h),
                pos2(x1, plot_area.bottom()),
            );

            let bar = ui.interact(bar_rect, response.id.with(("day", i)), Sense::hover());
            let outline = if bar.hovered() { style.accent } else { style.outline };
            let hatch_rect = bar_rect.shrink(1.0);
            if hatch_rect.is_positive() {
                paint_hatching(&painter.with_clip_rect(hatch_rect), hatch_rect, style.ink);
            }
            painter.rect_stroke(bar_rect, 0.0, Stroke::new(1.0, outline), StrokeKind::Inside);
            let _ = bar.on_hover_text(format!("{}: {}", label(bucket.key), bucket.value));
        }

        if let Some([from, to]) = *brush {
            let brush_rect = Rect::from_min_max(
                pos2(scale.scale(from) as f32, plot_area.top()),
                pos2(scale.scale(to) as f32, plot_area.bottom()),
            );
            painter.rect_filled(brush_rect, 0.0, style.brush);
            painter.rect_stroke(brush_rect, 0.0, Stroke::new(1.0, style.accent), StrokeKind::Inside);
        }

        if max_x_labels > 0 && !days.is_empty() {
            let step = days.len().div_ceil(max_x_labels).max(1);
            let tick_top = plot_rect.bottom();
            for bucket in days.iter().step_by(step) {
                let Some(start) = bucket
                    .key
                    .and_hms_opt(12, 0, 0)
                    .and_then(|noon| zone.millis(noon))
                else {
                    continue;
                };
                let x = scale.scale(start) as f32;
                painter.line_segment(
                    [pos2(x, tick_top), pos2(x, tick_top + tick_len)],
                    Stroke::new(1.0, style.outline),
                );
                painter.text(
                    pos2(x, tick_top + tick_len + tick_pad),
                    Align2::CENTER_TOP,
                    label(bucket.key),
                    font_id.clone(),
                    style.ink,
                );
            }
        }

        response
    }
}
