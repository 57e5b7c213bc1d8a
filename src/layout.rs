//! Cursor-based flow layout on top of [`Canvas`].
//!
//! The engine keeps a vertical cursor for the page being drawn. Every
//! primitive draws at the cursor and advances it; primitives spanning several
//! rows check for a page break first so they are never split across pages.

use crate::assets::RasterImage;
use crate::canvas::Canvas;
use crate::debug::DebugLogger;
use crate::error::QrDeckError;
use crate::font::{self, FontStyle};
use crate::types::{Color, Margins, Pt, Size};
use serde_json::json;
use std::collections::BTreeMap;
use sha2::{Digest, Sha256};

pub const DEFAULT_FONT_SIZE: f32 = 12.0;
/// Gap added below every text row, in millimetres.
pub const LINE_SPACING_MM: f32 = 2.0;

const CHART_TITLE_SPACING_MM: f32 = 5.0;
const CHART_HEIGHT_MM: f32 = 50.0;
const Y_LABEL_OFFSET_MM: f32 = 10.0;
const Y_LABEL_BASELINE_SHIFT_MM: f32 = 2.0;
/// Grid lines from zero to the maximum, both ends included.
const LINE_PLOT_GRID_LINES: i32 = 10;
const LINE_PLOT_LABEL_OFFSET_MM: f32 = 8.0;
const LINE_PLOT_LABEL_ANGLE: f32 = 30.0;
const HISTOGRAM_GRID_LINES: i32 = 6;
const HISTOGRAM_LABEL_OFFSET_MM: f32 = 5.0;
const HISTOGRAM_BAR_GAP_MM: f32 = 1.0;
const CARD_MAX_IMAGE_MM: f32 = 40.0;
const CARD_TEXT_GAP_MM: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

/// Mutable layout state for one document build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutCursor {
    pub y: Pt,
    pub page_size: Size,
    pub margins: Margins,
}

impl LayoutCursor {
    pub fn new(page_size: Size, margins: Margins) -> Self {
        Self {
            y: margins.top,
            page_size,
            margins,
        }
    }

    pub fn content_width(&self) -> Pt {
        self.page_size.width - self.margins.left - self.margins.right
    }

    pub fn content_height(&self) -> Pt {
        self.page_size.height - self.margins.top - self.margins.bottom
    }

    pub fn fits(&self, potential_height: Pt) -> bool {
        self.y + potential_height + self.margins.bottom <= self.page_size.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextRowOptions {
    pub margin_left: Pt,
    /// Anchor x; defaults to the left margin.
    pub x: Option<Pt>,
    pub font_size: Pt,
    pub align: TextAlign,
    pub style: FontStyle,
}

impl Default for TextRowOptions {
    fn default() -> Self {
        Self {
            margin_left: Pt::ZERO,
            x: None,
            font_size: Pt::from_f32(DEFAULT_FONT_SIZE),
            align: TextAlign::Left,
            style: FontStyle::Normal,
        }
    }
}

impl TextRowOptions {
    pub fn centered(x: Pt, font_size: f32) -> Self {
        Self {
            x: Some(x),
            font_size: Pt::from_f32(font_size),
            align: TextAlign::Center,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Spacing {
    Height(Pt),
    /// Multiples of the line height at the given font size.
    Rows { rows: u32, font_size: Pt },
}

impl Default for Spacing {
    fn default() -> Self {
        Spacing::Rows {
            rows: 1,
            font_size: Pt::from_f32(DEFAULT_FONT_SIZE),
        }
    }
}

/// Horizontal placement and plot height of a chart. `None` fields fall back
/// to the content box.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChartGeometry {
    pub x: Option<Pt>,
    pub width: Option<Pt>,
    pub height: Option<Pt>,
}

#[derive(Debug, Clone)]
pub struct LinePlot<'a> {
    pub title: &'a str,
    pub data: &'a BTreeMap<i32, usize>,
    pub geometry: ChartGeometry,
    pub title_font_size: Pt,
    pub axis_font_size: Pt,
    pub line_color: Color,
    pub point_radius: Pt,
}

impl<'a> LinePlot<'a> {
    pub fn new(title: &'a str, data: &'a BTreeMap<i32, usize>) -> Self {
        Self {
            title,
            data,
            geometry: ChartGeometry::default(),
            title_font_size: Pt::from_f32(DEFAULT_FONT_SIZE),
            axis_font_size: Pt::from_f32(DEFAULT_FONT_SIZE - 2.0),
            line_color: Color::BLUE,
            point_radius: Pt::from_mm(1.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Histogram<'a> {
    pub title: &'a str,
    pub bins: &'a [(String, usize)],
    pub geometry: ChartGeometry,
    pub title_font_size: Pt,
    pub bin_font_size: Pt,
    pub bar_color: Color,
}

impl<'a> Histogram<'a> {
    pub fn new(title: &'a str, bins: &'a [(String, usize)]) -> Self {
        Self {
            title,
            bins,
            geometry: ChartGeometry::default(),
            title_font_size: Pt::from_f32(DEFAULT_FONT_SIZE),
            bin_font_size: Pt::from_f32(DEFAULT_FONT_SIZE),
            bar_color: Color::BLUE,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageTextCard<'a> {
    /// Data URI or local path of the image shown left of the text.
    pub image: Option<&'a str>,
    pub rows: Vec<String>,
    pub font_size: Pt,
    pub max_image_size: Pt,
}

impl<'a> ImageTextCard<'a> {
    pub fn new(image: Option<&'a str>, rows: Vec<String>) -> Self {
        Self {
            image,
            rows,
            font_size: Pt::from_f32(DEFAULT_FONT_SIZE),
            max_image_size: Pt::from_mm(CARD_MAX_IMAGE_MM),
        }
    }
}

pub struct DocumentLayoutEngine<'a> {
    canvas: &'a mut Canvas,
    cursor: LayoutCursor,
    debug: Option<&'a DebugLogger>,
    failed_images: usize,
}

impl<'a> DocumentLayoutEngine<'a> {
    pub fn new(canvas: &'a mut Canvas, margins: Margins) -> Self {
        let cursor = LayoutCursor::new(canvas.page_size(), margins);
        Self {
            canvas,
            cursor,
            debug: None,
            failed_images: 0,
        }
    }

    pub(crate) fn with_debug(mut self, debug: Option<&'a DebugLogger>) -> Self {
        self.debug = debug;
        self
    }

    pub fn cursor(&self) -> &LayoutCursor {
        &self.cursor
    }

    pub fn canvas(&mut self) -> &mut Canvas {
        &mut *self.canvas
    }

    pub fn failed_images(&self) -> usize {
        self.failed_images
    }

    pub fn line_spacing(&self) -> Pt {
        Pt::from_mm(LINE_SPACING_MM)
    }

    /// Starts a new page when `potential_height` more content would run
    /// into the bottom margin. Returns whether a page was added.
    pub fn add_page_if_needed(&mut self, potential_height: Pt) -> bool {
        if self.cursor.fits(potential_height) {
            return false;
        }
        self.new_page();
        true
    }

    /// Unconditional page advance.
    pub fn new_page(&mut self) {
        self.canvas.show_page();
        self.cursor.y = self.cursor.margins.top;
        if let Some(debug) = self.debug {
            debug.event("page.break", json!({ "page": self.canvas.page_count() }));
        }
    }

    /// Draws one line of text with its left, centre or right edge at `x`
    /// and its baseline at `baseline`. The cursor is not touched.
    pub fn draw_text(
        &mut self,
        text: &str,
        x: Pt,
        baseline: Pt,
        font_size: Pt,
        style: FontStyle,
        align: TextAlign,
    ) {
        draw_aligned_text(self.canvas, text, x, baseline, font_size, style, align);
    }

    pub fn add_text_row(&mut self, text: &str, options: TextRowOptions) {
        let height = font::text_height(options.font_size);
        self.add_page_if_needed(height);
        self.cursor.y += height;
        let x = options.x.unwrap_or(self.cursor.margins.left) + options.margin_left;
        let baseline = self.cursor.y;
        self.draw_text(
            text,
            x,
            baseline,
            options.font_size,
            options.style,
            options.align,
        );
        self.cursor.y += self.line_spacing();
    }

    pub fn add_spacing(&mut self, spacing: Spacing) {
        self.cursor.y += match spacing {
            Spacing::Height(height) => height,
            Spacing::Rows { rows, font_size } => font::text_height(font_size) * rows as i32,
        };
        self.add_page_if_needed(Pt::from_mm(1.0));
    }

    /// Rule across the content width, centred in the gap below the last row.
    pub fn add_horizontal_line(&mut self) {
        let y = self.cursor.y - self.line_spacing() / 2.0;
        let left = self.cursor.margins.left;
        let right = self.cursor.page_size.width - self.cursor.margins.right;
        self.canvas.set_stroke_color(Color::BLACK);
        self.canvas.set_line_width(Pt::from_mm(0.1));
        self.canvas.line(left, y, right, y);
    }

    fn chart_box(&self, geometry: ChartGeometry) -> (Pt, Pt, Pt) {
        (
            geometry.x.unwrap_or(self.cursor.margins.left),
            geometry.width.unwrap_or(self.cursor.content_width()),
            geometry.height.unwrap_or(Pt::from_mm(CHART_HEIGHT_MM)),
        )
    }

    fn chart_title(&mut self, title: &str, font_size: Pt) {
        let center = self.cursor.page_size.width / 2.0;
        self.cursor.y += font::text_height(font_size);
        let baseline = self.cursor.y;
        self.draw_text(
            title,
            center,
            baseline,
            font_size,
            FontStyle::Normal,
            TextAlign::Center,
        );
    }

    #[allow(clippy::too_many_arguments)]
    fn y_grid(&mut self, x: Pt, width: Pt, bottom: Pt, height: Pt, lines: i32, max: usize, font_size: Pt) {
        let intervals = (lines - 1).max(1);
        let label_x = x - Pt::from_mm(Y_LABEL_OFFSET_MM);
        let shift = Pt::from_mm(Y_LABEL_BASELINE_SHIFT_MM);
        self.canvas.set_stroke_color(Color::gray(200));
        self.canvas.set_line_width(Pt::from_mm(0.1));
        for i in 0..=intervals {
            let y = bottom - height * (i as f32 / intervals as f32);
            let value = (i as f64 * max as f64 / intervals as f64).round() as u64;
            self.draw_text(
                &value.to_string(),
                label_x,
                y + shift,
                font_size,
                FontStyle::Normal,
                TextAlign::Left,
            );
            self.canvas.line(x, y, x + width, y);
        }
    }

    /// Title, y-axis grid, and one point per year joined left to right.
    /// X labels are thinned so neighbouring labels do not overlap.
    pub fn add_line_plot(&mut self, plot: LinePlot<'_>) {
        let (x, width, height) = self.chart_box(plot.geometry);
        let title_spacing = Pt::from_mm(CHART_TITLE_SPACING_MM);
        let label_offset = Pt::from_mm(LINE_PLOT_LABEL_OFFSET_MM);
        let title_offset = font::text_height(plot.title_font_size) + title_spacing + self.line_spacing();
        let potential_height = title_offset + height + label_offset;
        self.add_page_if_needed(potential_height);

        let top = self.cursor.y;
        self.chart_title(plot.title, plot.title_font_size);
        let bottom = top + title_offset + height;

        let years: Vec<i32> = plot.data.keys().copied().collect();
        let counts: Vec<usize> = plot.data.values().copied().collect();
        let max_count = counts.iter().copied().max().unwrap_or(0).max(1);

        self.y_grid(x, width, bottom, height, LINE_PLOT_GRID_LINES, max_count, plot.axis_font_size);

        let x_spacing = if years.len() <= 1 {
            width
        } else {
            width / (years.len() - 1) as f32
        };
        let label_width = font::text_width(FontStyle::Normal, plot.axis_font_size, "2024");
        let label_step = x_axis_label_step(label_width, x_spacing);

        let point = |i: usize| {
            let px = x + x_spacing * i as i32;
            let py = bottom - height * (counts[i] as f32 / max_count as f32);
            (px, py)
        };

        self.canvas.set_stroke_color(plot.line_color);
        self.canvas.set_fill_color(plot.line_color);
        self.canvas.set_line_width(Pt::from_mm(0.5));
        for i in 0..years.len() {
            let (px, py) = point(i);
            self.canvas.fill_circle(px, py, plot.point_radius);
            if i > 0 {
                let (prev_x, prev_y) = point(i - 1);
                self.canvas.line(prev_x, prev_y, px, py);
            }
        }

        self.canvas.set_fill_color(Color::BLACK);
        self.canvas.set_font(FontStyle::Normal);
        self.canvas.set_font_size(plot.axis_font_size);
        for (i, year) in years.iter().enumerate() {
            if i == 0 || i % label_step == 0 || i == years.len() - 1 {
                let (px, _) = point(i);
                self.canvas.draw_string_rotated(
                    px - label_width / 2.0,
                    bottom + label_offset,
                    year.to_string(),
                    LINE_PLOT_LABEL_ANGLE,
                );
            }
        }
        self.canvas.set_stroke_color(Color::BLACK);
        self.canvas.set_line_width(Pt::from_mm(0.1));

        self.cursor.y = top + potential_height;
    }

    /// Bars scaled against the largest bin. Labels lose their first two
    /// characters when their combined width exceeds the content width, so
    /// `"1950"` prints as `"50"` and `"1990-1999"` as `"90-1999"`.
    pub fn add_histogram(&mut self, histogram: Histogram<'_>) {
        let (x, width, height) = self.chart_box(histogram.geometry);
        let title_spacing = Pt::from_mm(CHART_TITLE_SPACING_MM);
        let label_offset = Pt::from_mm(HISTOGRAM_LABEL_OFFSET_MM);
        let potential_height = font::text_height(histogram.title_font_size)
            + font::text_height(histogram.bin_font_size)
            + title_spacing
            + height
            + label_offset
            + self.line_spacing();
        self.add_page_if_needed(potential_height);

        let top = self.cursor.y;
        self.chart_title(histogram.title, histogram.title_font_size);
        let plot_top = self.cursor.y + self.line_spacing() + title_spacing;
        let bottom = plot_top + height;

        let max_value = histogram
            .bins
            .iter()
            .map(|(_, count)| *count)
            .max()
            .unwrap_or(0)
            .max(1);
        self.y_grid(x, width, bottom, height, HISTOGRAM_GRID_LINES, max_value, histogram.bin_font_size);

        let total_label_width: Pt = histogram
            .bins
            .iter()
            .map(|(label, _)| font::text_width(FontStyle::Normal, histogram.bin_font_size, label))
            .sum();
        let abbreviate = total_label_width > self.cursor.content_width();
        let bar_width = width / histogram.bins.len().max(1) as f32;
        let bar_gap = Pt::from_mm(HISTOGRAM_BAR_GAP_MM);

        for (i, (label, count)) in histogram.bins.iter().enumerate() {
            let bar_height = height * (*count as f32 / max_value as f32);
            let bar_x = x + bar_width * i as i32;
            self.canvas.set_fill_color(histogram.bar_color);
            self.canvas
                .draw_rect(bar_x, bottom - bar_height, (bar_width - bar_gap).max(Pt::ZERO), bar_height);
            let text = if abbreviate {
                abbreviate_label(label)
            } else {
                label.as_str()
            };
            self.draw_text(
                text,
                bar_x + bar_width / 2.0,
                bottom + label_offset,
                histogram.bin_font_size,
                FontStyle::Normal,
                TextAlign::Center,
            );
        }
        self.canvas.set_stroke_color(Color::BLACK);

        self.cursor.y = top + potential_height;
    }

    /// Optional bordered image on the left with text rows beside it. The
    /// cursor ends below the taller of the two. An image that cannot be
    /// loaded is logged and left out; the card is still drawn.
    pub fn add_image_text_card(&mut self, card: ImageTextCard<'_>) -> bool {
        let row_height = font::text_height(card.font_size) + self.line_spacing();
        let rows_height = row_height * card.rows.len() as i32;
        let image_size = rows_height.min(card.max_image_size);
        self.add_page_if_needed(rows_height.max(image_size));

        let left = self.cursor.margins.left;
        let top = self.cursor.y;
        let mut image_drawn = false;
        if let Some(source) = card.image {
            match self.embed_image(source) {
                Ok(resource_id) => {
                    self.canvas.set_stroke_color(Color::BLACK);
                    self.canvas.set_line_width(Pt::from_mm(0.1));
                    self.canvas.stroke_rect(left, top, image_size, image_size);
                    self.canvas
                        .draw_image(left, top, image_size, image_size, resource_id);
                    image_drawn = true;
                }
                Err(err) => {
                    self.failed_images += 1;
                    log::warn!("card image skipped: {err}");
                    if let Some(debug) = self.debug {
                        debug.event(
                            "asset.failed",
                            json!({ "source": truncate_source(source), "error": err.to_string() }),
                        );
                    }
                }
            }
        }

        let text_x = left + image_size + Pt::from_mm(CARD_TEXT_GAP_MM);
        for row in &card.rows {
            self.cursor.y += font::text_height(card.font_size);
            let baseline = self.cursor.y;
            self.draw_text(
                row,
                text_x,
                baseline,
                card.font_size,
                FontStyle::Normal,
                TextAlign::Left,
            );
            self.cursor.y += self.line_spacing();
        }
        self.cursor.y = top + rows_height.max(image_size);
        image_drawn
    }

    fn embed_image(&mut self, source: &str) -> Result<String, QrDeckError> {
        let resource_id = image_resource_id(source);
        if !self.canvas.has_image(&resource_id) {
            let image = RasterImage::load(source)?;
            self.canvas.add_image(resource_id.clone(), image);
        }
        Ok(resource_id)
    }
}

/// Draws black text whose left edge, centre or right edge sits at `x`.
pub fn draw_aligned_text(
    canvas: &mut Canvas,
    text: &str,
    x: Pt,
    baseline: Pt,
    font_size: Pt,
    style: FontStyle,
    align: TextAlign,
) {
    let width = font::text_width(style, font_size, text);
    let left = match align {
        TextAlign::Left => x,
        TextAlign::Center => x - width / 2.0,
        TextAlign::Right => x - width,
    };
    canvas.set_font(style);
    canvas.set_font_size(font_size);
    canvas.set_fill_color(Color::BLACK);
    canvas.draw_string(left, baseline, text);
}

/// Every `step`-th x label is printed when labels are wider than the
/// spacing between points.
pub fn x_axis_label_step(label_width: Pt, point_spacing: Pt) -> usize {
    if point_spacing <= Pt::ZERO {
        return 1;
    }
    if point_spacing < label_width {
        (label_width.to_f32() / point_spacing.to_f32()).ceil().max(1.0) as usize
    } else {
        1
    }
}

fn abbreviate_label(label: &str) -> &str {
    match label.char_indices().nth(2) {
        Some((idx, _)) => &label[idx..],
        None => label,
    }
}

/// Stable across runs and toolchains: the first eight bytes of the
/// source's SHA-256.
fn image_resource_id(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    let hex: String = digest[..8].iter().map(|b| format!("{b:02x}")).collect();
    format!("img-{hex}")
}

fn truncate_source(source: &str) -> String {
    if source.chars().count() <= 64 {
        source.to_string()
    } else {
        let head: String = source.chars().take(64).collect();
        format!("{head}...")
    }
}
