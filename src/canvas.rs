use crate::assets::RasterImage;
use crate::font::FontStyle;
use crate::types::{Color, Pt, Size};
use std::collections::BTreeMap;

/// Recorded drawing operation. Coordinates use a top-left origin with y
/// growing downwards; the PDF writer flips them into PDF space.
#[derive(Debug, Clone)]
pub enum Command {
    SaveState,
    RestoreState,
    // Non-rendered metadata used for page-aware reporting. Ignored by the PDF renderer.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetLineWidth(Pt),
    SetDash {
        pattern: Vec<Pt>,
        phase: Pt,
    },
    SetFont(FontStyle),
    SetFontSize(Pt),
    MoveTo {
        x: Pt,
        y: Pt,
    },
    LineTo {
        x: Pt,
        y: Pt,
    },
    CurveTo {
        x1: Pt,
        y1: Pt,
        x2: Pt,
        y2: Pt,
        x: Pt,
        y: Pt,
    },
    ClosePath,
    Fill,
    Stroke,
    // `y` is the text baseline.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
    // Text with an explicit PDF-space linear transform, anchored at the baseline origin.
    DrawStringTransformed {
        x: Pt,
        y: Pt,
        text: String,
        m00: f32,
        m01: f32,
        m10: f32,
        m11: f32,
    },
    DrawRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    DrawImage {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    pub fn meta_values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.commands.iter().filter_map(move |cmd| match cmd {
            Command::Meta { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }

    pub fn text_runs(&self) -> impl Iterator<Item = &str> {
        self.commands.iter().filter_map(|cmd| match cmd {
            Command::DrawString { text, .. } | Command::DrawStringTransformed { text, .. } => {
                Some(text.as_str())
            }
            _ => None,
        })
    }
}

/// Finished page list plus the image resources its pages reference.
#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
    pub images: BTreeMap<String, RasterImage>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone)]
struct PenState {
    fill_color: Color,
    stroke_color: Color,
    line_width: Pt,
    font: FontStyle,
    font_size: Pt,
}

impl Default for PenState {
    fn default() -> Self {
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            line_width: Pt::from_mm(0.1),
            font: FontStyle::Normal,
            font_size: Pt::from_f32(12.0),
        }
    }
}

// Bezier control distance for a quarter circle.
const CIRCLE_KAPPA: f32 = 0.552_284_75;

pub struct Canvas {
    page_size: Size,
    pages: Vec<Page>,
    open_page: Page,
    images: BTreeMap<String, RasterImage>,
    saved: Vec<PenState>,
    pen: PenState,
}

impl Canvas {
    pub fn new(page_size: Size) -> Self {
        Self {
            page_size,
            pages: Vec::new(),
            open_page: Page::default(),
            images: BTreeMap::new(),
            saved: Vec::new(),
            pen: PenState::default(),
        }
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    /// Number of pages including the one currently being drawn.
    pub fn page_count(&self) -> usize {
        self.pages.len() + 1
    }

    pub fn save_state(&mut self) {
        self.saved.push(self.pen.clone());
        self.record(Command::SaveState);
    }

    pub fn restore_state(&mut self) {
        if let Some(state) = self.saved.pop() {
            self.pen = state;
            self.record(Command::RestoreState);
        }
    }

    fn record(&mut self, command: Command) {
        self.open_page.commands.push(command);
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.record(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.pen.fill_color == color {
            return;
        }
        self.pen.fill_color = color;
        self.record(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.pen.stroke_color == color {
            return;
        }
        self.pen.stroke_color = color;
        self.record(Command::SetStrokeColor(color));
    }

    pub fn set_line_width(&mut self, width: Pt) {
        let width = width.max(Pt::ZERO);
        if self.pen.line_width == width {
            return;
        }
        self.pen.line_width = width;
        self.record(Command::SetLineWidth(width));
    }

    /// An empty pattern restores solid lines.
    pub fn set_dash(&mut self, pattern: Vec<Pt>, phase: Pt) {
        self.record(Command::SetDash { pattern, phase });
    }

    pub fn set_font(&mut self, font: FontStyle) {
        if self.pen.font == font {
            return;
        }
        self.pen.font = font;
        self.record(Command::SetFont(font));
    }

    pub fn set_font_size(&mut self, size: Pt) {
        if self.pen.font_size == size {
            return;
        }
        self.pen.font_size = size;
        self.record(Command::SetFontSize(size));
    }

    pub fn font(&self) -> FontStyle {
        self.pen.font
    }

    pub fn font_size(&self) -> Pt {
        self.pen.font_size
    }

    pub fn move_to(&mut self, x: Pt, y: Pt) {
        self.record(Command::MoveTo { x, y });
    }

    pub fn line_to(&mut self, x: Pt, y: Pt) {
        self.record(Command::LineTo { x, y });
    }

    pub fn curve_to(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt, x: Pt, y: Pt) {
        self.record(Command::CurveTo {
            x1,
            y1,
            x2,
            y2,
            x,
            y,
        });
    }

    pub fn close_path(&mut self) {
        self.record(Command::ClosePath);
    }

    pub fn fill(&mut self) {
        self.record(Command::Fill);
    }

    pub fn stroke(&mut self) {
        self.record(Command::Stroke);
    }

    pub fn line(&mut self, x1: Pt, y1: Pt, x2: Pt, y2: Pt) {
        self.move_to(x1, y1);
        self.line_to(x2, y2);
        self.stroke();
    }

    pub fn stroke_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.move_to(x, y);
        self.line_to(x + width, y);
        self.line_to(x + width, y + height);
        self.line_to(x, y + height);
        self.close_path();
        self.stroke();
    }

    pub fn fill_circle(&mut self, cx: Pt, cy: Pt, radius: Pt) {
        let k = radius * CIRCLE_KAPPA;
        self.move_to(cx + radius, cy);
        self.curve_to(cx + radius, cy + k, cx + k, cy + radius, cx, cy + radius);
        self.curve_to(cx - k, cy + radius, cx - radius, cy + k, cx - radius, cy);
        self.curve_to(cx - radius, cy - k, cx - k, cy - radius, cx, cy - radius);
        self.curve_to(cx + k, cy - radius, cx + radius, cy - k, cx + radius, cy);
        self.close_path();
        self.fill();
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.record(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    /// Draws text rotated counter-clockwise around its baseline origin.
    pub fn draw_string_rotated(&mut self, x: Pt, y: Pt, text: impl Into<String>, degrees: f32) {
        let radians = degrees.to_radians();
        let cos = libm::cosf(radians);
        let sin = libm::sinf(radians);
        self.record(Command::DrawStringTransformed {
            x,
            y,
            text: text.into(),
            m00: cos,
            m01: sin,
            m10: -sin,
            m11: cos,
        });
    }

    pub fn draw_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.record(Command::DrawRect {
            x,
            y,
            width,
            height,
        });
    }

    /// Registers an image resource once; later registrations under the same id are ignored.
    pub fn add_image(&mut self, resource_id: impl Into<String>, image: RasterImage) {
        self.images.entry(resource_id.into()).or_insert(image);
    }

    pub fn has_image(&self, resource_id: &str) -> bool {
        self.images.contains_key(resource_id)
    }

    pub fn draw_image(
        &mut self,
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
        resource_id: impl Into<String>,
    ) {
        self.record(Command::DrawImage {
            x,
            y,
            width,
            height,
            resource_id: resource_id.into(),
        });
    }

    pub fn show_page(&mut self) {
        let page = std::mem::take(&mut self.open_page);
        self.pages.push(page);
        self.saved.clear();
        self.pen = PenState::default();
    }

    pub fn is_page_blank(&self) -> bool {
        self.open_page.commands.is_empty()
    }

    pub fn finish(mut self) -> Document {
        if !self.open_page.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
            images: self.images,
        }
    }
}
