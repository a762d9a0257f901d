use egui::{pos2, Color32, Painter, Rect, Stroke, Style};

/// Colours shared by the chart widgets.
#[derive(Clone, Copy, Debug)]
pub struct ChartStyle {
    pub ink: Color32,
    pub outline: Color32,
    pub grid: Color32,
    pub accent: Color32,
    /// Fill of the brush rectangle.
    pub brush: Color32,
}

impl From<&Style> for ChartStyle {
    fn from(style: &Style) -> Self {
        let visuals = &style.visuals;
        let accent = visuals.selection.stroke.color;
        Self {
            ink: visuals.text_color(),
            outline: visuals.widgets.noninteractive.fg_stroke.color,
            grid: visuals.widgets.noninteractive.bg_stroke.color,
            accent,
            brush: accent.gamma_multiply(0.2),
        }
    }
}

pub(crate) fn paint_hatching(painter: &Painter, rect: Rect, color: Color32) {
    let spacing = 8.0;
    let stroke = Stroke::new(1.0, color);

    let h = rect.height();
    let mut x = rect.left() - h;
    while x < rect.right() + h {
        painter.line_segment([pos2(x, rect.top()), pos2(x + h, rect.bottom())], stroke);
        x += spacing;
    }
}
