//! Duplex QR card sheets.
//!
//! Each sheet is a front page with one QR code per valid track followed by a
//! back page carrying the matching labels. Back page columns are mirrored so
//! that after a flip along the vertical axis every label lands behind its QR
//! code.

use crate::canvas::Canvas;
use crate::debug::DebugLogger;
use crate::error::QrDeckError;
use crate::font::{self, FontStyle};
use crate::layout::{TextAlign, draw_aligned_text};
use crate::progress::{percent_of, sampling_interval};
use crate::qr::QrEncoder;
use crate::stats::ValidTrackRecord;
use crate::types::{Color, Pt, Size};
use serde_json::json;

/// Metadata key recording `side:row:col:track_index` for every drawn cell.
pub const CELL_META_KEY: &str = "qrdeck.cell";

const SCISSOR_GRAY: u8 = 200;
const SCISSOR_WIDTH_MM: f32 = 0.05;
const SCISSOR_DASH_MM: f32 = 5.0;
const SCISSOR_PHASE_MM: f32 = 1.0;
const BACK_TOP_MARGIN_MM: f32 = 5.0;
const BACK_SIDE_MARGIN_MM: f32 = 1.0;
const BACK_TEXT_FONT_SIZE: f32 = 10.0;
const BACK_YEAR_FONT_SIZE: f32 = 24.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridSpec {
    pub rows: u32,
    pub columns: u32,
    pub qr_size: Pt,
}

impl Default for GridSpec {
    fn default() -> Self {
        Self {
            rows: 5,
            columns: 4,
            qr_size: Pt::from_mm(40.0),
        }
    }
}

impl GridSpec {
    pub fn per_sheet(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// Free space per cell, split evenly around the QR code.
    pub fn spacing(&self, page: Size) -> (Pt, Pt) {
        let columns = self.columns.max(1) as i32;
        let rows = self.rows.max(1) as i32;
        (
            (page.width - self.qr_size * columns) / columns as f32,
            (page.height - self.qr_size * rows) / rows as f32,
        )
    }

    /// Cell pitch; `columns * pitch.0` spans the page width.
    pub fn pitch(&self, page: Size) -> (Pt, Pt) {
        let (spacing_x, spacing_y) = self.spacing(page);
        (self.qr_size + spacing_x, self.qr_size + spacing_y)
    }

    pub fn sheet_count(&self, tracks: usize) -> usize {
        tracks.div_ceil(self.per_sheet().max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellPosition {
    pub row: u32,
    pub col: u32,
}

/// Row-major position of the `index`-th code on a front page.
pub fn front_cell(grid: &GridSpec, index: usize) -> CellPosition {
    let columns = grid.columns.max(1) as usize;
    CellPosition {
        row: (index / columns) as u32,
        col: (index % columns) as u32,
    }
}

/// Position of the `index`-th label on a back page: same row, mirrored column.
pub fn backside_cell(grid: &GridSpec, index: usize) -> CellPosition {
    let front = front_cell(grid, index);
    CellPosition {
        row: front.row,
        col: grid.columns.max(1) - 1 - front.col,
    }
}

pub struct QrSheetRenderer<'a> {
    grid: GridSpec,
    encoder: &'a dyn QrEncoder,
    scissor_lines: bool,
    debug: Option<&'a DebugLogger>,
}

impl<'a> QrSheetRenderer<'a> {
    pub fn new(grid: GridSpec, encoder: &'a dyn QrEncoder) -> Self {
        Self {
            grid,
            encoder,
            scissor_lines: true,
            debug: None,
        }
    }

    pub fn scissor_lines(mut self, enabled: bool) -> Self {
        self.scissor_lines = enabled;
        self
    }

    pub(crate) fn with_debug(mut self, debug: Option<&'a DebugLogger>) -> Self {
        self.debug = debug;
        self
    }

    /// Appends front and back pages for `tracks`, starting on the canvas'
    /// current page, which must be empty. `on_progress` receives the percent
    /// of placed codes every `sampling_interval` codes and after the last one.
    pub fn render(
        &self,
        canvas: &mut Canvas,
        tracks: &[ValidTrackRecord],
        on_progress: &mut dyn FnMut(u8),
    ) -> Result<(), QrDeckError> {
        let page = canvas.page_size();
        if self.grid.per_sheet() == 0
            || self.grid.qr_size <= Pt::ZERO
            || self.grid.qr_size * self.grid.columns as i32 > page.width
            || self.grid.qr_size * self.grid.rows as i32 > page.height
        {
            return Err(QrDeckError::Layout(format!(
                "{}x{} grid of {:.1}mm codes does not fit the page",
                self.grid.rows,
                self.grid.columns,
                self.grid.qr_size.to_mm()
            )));
        }
        let total = tracks.len();
        let interval = sampling_interval(total);
        let mut placed = 0usize;

        for (sheet, chunk) in tracks.chunks(self.grid.per_sheet()).enumerate() {
            let first_index = sheet * self.grid.per_sheet();
            self.draw_scissor_lines(canvas);
            for (i, track) in chunk.iter().enumerate() {
                self.draw_front_cell(canvas, i, first_index + i, track)?;
                placed += 1;
                if placed % interval == 0 || placed == total {
                    on_progress(percent_of(placed, total));
                }
            }
            canvas.show_page();

            self.draw_scissor_lines(canvas);
            for (i, track) in chunk.iter().enumerate() {
                self.draw_back_cell(canvas, i, first_index + i, track);
            }
            if let Some(debug) = self.debug {
                debug.event(
                    "sheet.back",
                    json!({ "sheet": sheet, "cells": chunk.len(), "page": canvas.page_count() }),
                );
            }
            canvas.show_page();
        }
        log::debug!(
            "qr sheets: {} codes on {} sheets",
            total,
            self.grid.sheet_count(total)
        );
        Ok(())
    }

    fn draw_scissor_lines(&self, canvas: &mut Canvas) {
        if !self.scissor_lines {
            return;
        }
        let page = canvas.page_size();
        let (pitch_x, pitch_y) = self.grid.pitch(page);
        canvas.save_state();
        canvas.set_stroke_color(Color::gray(SCISSOR_GRAY));
        canvas.set_line_width(Pt::from_mm(SCISSOR_WIDTH_MM));
        canvas.set_dash(
            vec![Pt::from_mm(SCISSOR_DASH_MM), Pt::from_mm(SCISSOR_DASH_MM)],
            Pt::from_mm(SCISSOR_PHASE_MM),
        );
        for i in 1..self.grid.columns as i32 {
            let x = pitch_x * i;
            canvas.line(x, Pt::ZERO, x, page.height);
        }
        for i in 1..self.grid.rows as i32 {
            let y = pitch_y * i;
            canvas.line(Pt::ZERO, y, page.width, y);
        }
        canvas.restore_state();
    }

    fn draw_front_cell(
        &self,
        canvas: &mut Canvas,
        slot: usize,
        index: usize,
        track: &ValidTrackRecord,
    ) -> Result<(), QrDeckError> {
        let cell = front_cell(&self.grid, slot);
        let page = canvas.page_size();
        let (spacing_x, spacing_y) = self.grid.spacing(page);
        let (pitch_x, pitch_y) = self.grid.pitch(page);
        let x = spacing_x / 2.0 + pitch_x * cell.col as i32;
        let y = spacing_y / 2.0 + pitch_y * cell.row as i32;

        let bitmap = self.encoder.encode(&track.track.uri)?;
        let resource_id = format!("qr-{index}");
        canvas.add_image(resource_id.clone(), bitmap.to_raster()?);
        canvas.meta(CELL_META_KEY, format!("front:{}:{}:{index}", cell.row, cell.col));
        canvas.draw_image(x, y, self.grid.qr_size, self.grid.qr_size, resource_id);
        Ok(())
    }

    fn draw_back_cell(&self, canvas: &mut Canvas, slot: usize, index: usize, track: &ValidTrackRecord) {
        let cell = backside_cell(&self.grid, slot);
        let page = canvas.page_size();
        let (pitch_x, pitch_y) = self.grid.pitch(page);
        let center_x = pitch_x * (cell.col as f32 + 0.5);
        let row_top = pitch_y * cell.row as i32;
        let available_width =
            page.width / self.grid.columns.max(1) as f32 - Pt::from_mm(BACK_SIDE_MARGIN_MM) * 2;
        let text_size = Pt::from_f32(BACK_TEXT_FONT_SIZE);
        let year_size = Pt::from_f32(BACK_YEAR_FONT_SIZE);

        canvas.meta(CELL_META_KEY, format!("back:{}:{}:{index}", cell.row, cell.col));

        let artists = font::split_text_to_size(
            &track.track.artist_names(),
            available_width,
            FontStyle::Bold,
            text_size,
        );
        draw_centered_lines(
            canvas,
            &artists,
            center_x,
            row_top + Pt::from_mm(BACK_TOP_MARGIN_MM),
            text_size,
            FontStyle::Bold,
        );

        let name = font::split_text_to_size(&track.track.name, available_width, FontStyle::Italic, text_size);
        draw_centered_lines(
            canvas,
            &name,
            center_x,
            pitch_y * (cell.row as f32 + 0.75),
            text_size,
            FontStyle::Italic,
        );

        let middle = pitch_y * (cell.row as f32 + 0.5);
        draw_aligned_text(
            canvas,
            &track.print_date,
            center_x,
            middle + font::text_height(year_size) / 2.0,
            text_size,
            FontStyle::Normal,
            TextAlign::Center,
        );
        draw_aligned_text(
            canvas,
            &track.year.to_string(),
            center_x,
            middle,
            year_size,
            FontStyle::Bold,
            TextAlign::Center,
        );
    }
}

fn draw_centered_lines(
    canvas: &mut Canvas,
    lines: &[String],
    center_x: Pt,
    first_baseline: Pt,
    font_size: Pt,
    style: FontStyle,
) {
    let line_height = font::text_height(font_size);
    for (i, line) in lines.iter().enumerate() {
        if line.is_empty() {
            continue;
        }
        draw_aligned_text(
            canvas,
            line,
            center_x,
            first_baseline + line_height * i as i32,
            font_size,
            style,
            TextAlign::Center,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::Command;
    use crate::model::{AlbumInfo, ArtistRef, ReleaseDatePrecision, TrackRecord};
    use crate::qr::QrCodeEncoder;

    fn valid_track(i: usize, artists: Vec<&str>) -> ValidTrackRecord {
        let track = TrackRecord {
            id: format!("t{i}"),
            uri: format!("spotify:track:t{i}"),
            name: format!("Song number {i}"),
            duration_ms: 200_000,
            explicit: false,
            artists: artists
                .into_iter()
                .map(|name| ArtistRef {
                    id: None,
                    name: name.to_string(),
                })
                .collect(),
            album: Some(AlbumInfo {
                id: "al".into(),
                name: "Album".into(),
                album_type: "album".into(),
                total_tracks: 10,
                release_date: format!("{}-02-03", 1980 + i),
                release_date_precision: Some(ReleaseDatePrecision::Day),
            }),
            popularity: None,
            kind: Some("track".into()),
        };
        ValidTrackRecord::new(&track).unwrap()
    }

    fn tracks(n: usize) -> Vec<ValidTrackRecord> {
        (0..n).map(|i| valid_track(i, vec!["Artist"])).collect()
    }

    fn parse_cells(values: Vec<&str>) -> Vec<(u32, u32, usize)> {
        values
            .iter()
            .map(|v| {
                let parts: Vec<&str> = v.split(':').collect();
                (
                    parts[1].parse().unwrap(),
                    parts[2].parse().unwrap(),
                    parts[3].parse().unwrap(),
                )
            })
            .collect()
    }

    fn render(grid: GridSpec, tracks: &[ValidTrackRecord]) -> (crate::canvas::Document, Vec<u8>) {
        let encoder = QrCodeEncoder::default();
        let mut canvas = Canvas::new(Size::a4());
        let mut progress = Vec::new();
        QrSheetRenderer::new(grid, &encoder)
            .render(&mut canvas, tracks, &mut |p| progress.push(p))
            .unwrap();
        (canvas.finish(), progress)
    }

    #[test]
    fn pitch_spans_the_page() {
        let grid = GridSpec::default();
        let page = Size::a4();
        let (pitch_x, pitch_y) = grid.pitch(page);
        assert!(((pitch_x * 4).to_f32() - page.width.to_f32()).abs() < 0.01);
        assert!(((pitch_y * 5).to_f32() - page.height.to_f32()).abs() < 0.01);
        assert_eq!(grid.per_sheet(), 20);
        assert_eq!(grid.sheet_count(30), 2);
        assert_eq!(grid.sheet_count(0), 0);
    }

    #[test]
    fn backside_mirrors_columns() {
        let grid = GridSpec {
            rows: 2,
            columns: 4,
            qr_size: Pt::from_mm(40.0),
        };
        let (doc, _) = render(grid, &tracks(8));
        assert_eq!(doc.page_count(), 2);

        let back = parse_cells(doc.pages[1].meta_values(CELL_META_KEY).collect());
        // Read the back page left to right, row by row.
        let mut by_position = back.clone();
        by_position.sort_by_key(|(row, col, _)| (*row, *col));
        let order: Vec<usize> = by_position.iter().map(|(_, _, index)| *index).collect();
        assert_eq!(order, vec![3, 2, 1, 0, 7, 6, 5, 4]);

        let front = parse_cells(doc.pages[0].meta_values(CELL_META_KEY).collect());
        for (row, col, index) in front {
            let mirrored = back.iter().find(|(_, _, i)| *i == index).unwrap();
            assert_eq!(mirrored.0, row);
            assert_eq!(mirrored.1, 3 - col);
        }
    }

    #[test]
    fn partial_last_sheet_only_labels_occupied_cells() {
        let (doc, progress) = render(GridSpec::default(), &tracks(23));
        assert_eq!(doc.page_count(), 4);
        assert_eq!(doc.pages[2].meta_values(CELL_META_KEY).count(), 3);
        assert_eq!(doc.pages[3].meta_values(CELL_META_KEY).count(), 3);
        let back = parse_cells(doc.pages[3].meta_values(CELL_META_KEY).collect());
        assert_eq!(back, vec![(0, 3, 20), (0, 2, 21), (0, 1, 22)]);
        assert_eq!(doc.images.len(), 23);
        assert_eq!(progress.len(), 23);
        assert_eq!(progress.last(), Some(&100));
    }

    #[test]
    fn back_cell_prints_year_date_and_names() {
        let (doc, _) = render(GridSpec::default(), &[valid_track(4, vec!["Alpha", "Beta"])]);
        let texts: Vec<&str> = doc.pages[1].text_runs().collect();
        assert_eq!(texts, vec!["Alpha, Beta", "Song number 4", "03.02.1984", "1984"]);
    }

    #[test]
    fn empty_artist_list_renders_empty_block() {
        let (doc, _) = render(GridSpec::default(), &[valid_track(1, Vec::new())]);
        let texts: Vec<&str> = doc.pages[1].text_runs().collect();
        assert_eq!(texts, vec!["Song number 1", "03.02.1981", "1981"]);
    }

    #[test]
    fn scissor_lines_are_dashed_and_optional() {
        let encoder = QrCodeEncoder::default();
        let mut canvas = Canvas::new(Size::a4());
        QrSheetRenderer::new(GridSpec::default(), &encoder)
            .render(&mut canvas, &tracks(1), &mut |_| {})
            .unwrap();
        let doc = canvas.finish();
        let dashes = doc.pages[0]
            .commands
            .iter()
            .filter(|c| matches!(c, Command::SetDash { .. }))
            .count();
        assert_eq!(dashes, 1);
        // 3 vertical and 4 horizontal guides.
        let strokes = doc.pages[0]
            .commands
            .iter()
            .filter(|c| matches!(c, Command::Stroke))
            .count();
        assert_eq!(strokes, 7);

        let mut canvas = Canvas::new(Size::a4());
        QrSheetRenderer::new(GridSpec::default(), &encoder)
            .scissor_lines(false)
            .render(&mut canvas, &tracks(1), &mut |_| {})
            .unwrap();
        let doc = canvas.finish();
        assert!(!doc.pages[0]
            .commands
            .iter()
            .any(|c| matches!(c, Command::SetDash { .. } | Command::Stroke)));
    }

    #[test]
    fn no_tracks_adds_no_pages() {
        let (doc, progress) = render(GridSpec::default(), &[]);
        assert_eq!(doc.page_count(), 1);
        assert!(doc.pages[0].commands.is_empty());
        assert!(progress.is_empty());
    }

    #[test]
    fn progress_is_sampled_for_large_decks() {
        let (_, progress) = render(GridSpec::default(), &tracks(250));
        // Interval of 2 codes.
        assert_eq!(progress.len(), 125);
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(progress.last(), Some(&100));
    }

    #[test]
    fn oversized_grid_is_a_layout_error() {
        let encoder = QrCodeEncoder::default();
        let mut canvas = Canvas::new(Size::a4());
        let grid = GridSpec {
            rows: 5,
            columns: 6,
            qr_size: Pt::from_mm(40.0),
        };
        let err = QrSheetRenderer::new(grid, &encoder)
            .render(&mut canvas, &tracks(1), &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, QrDeckError::Layout(_)));
        assert!(canvas.is_page_blank());
    }
}
