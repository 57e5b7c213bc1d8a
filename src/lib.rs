mod assets;
mod canvas;
mod debug;
mod error;
mod font;
mod layout;
mod metrics;
mod model;
mod pdf;
mod pdfinspect;
mod pipeline;
mod progress;
mod qr;
mod qr_sheet;
mod stats;
mod stats_page;
mod types;
mod worker;

pub use assets::{ImageColorSpace, ImageFilter, RasterImage};
pub use canvas::{Canvas, Command, Document, Page};
use debug::DebugLogger;
pub use error::QrDeckError;
pub use font::{FontStyle, LINE_HEIGHT_FACTOR, split_text_to_size, text_height, text_width};
pub use layout::{
    ChartGeometry, DocumentLayoutEngine, Histogram, ImageTextCard, LayoutCursor, LinePlot,
    Spacing, TextAlign, TextRowOptions, draw_aligned_text, x_axis_label_step,
};
pub use metrics::{DocumentMetrics, PageMetrics};
pub use model::{
    AlbumInfo, ArtistRef, ImageRef, OtherItem, Owner, Playlist, PlaylistItem, PlaylistSummary,
    ReleaseDatePrecision, ShowRef, TrackItem, TrackRecord, TrackTotal, parse_playlists,
};
use pdf::PdfOptions;
pub use pdfinspect::{
    PdfInspectError, PdfInspectErrorCode, PdfInspectReport, deck_layout_issues,
    inspect_pdf_bytes, inspect_pdf_path, require_deck_layout,
};
use pipeline::DeckSettings;
pub use pipeline::GenerationOutput;
pub use progress::{ProgressEvent, ProgressSection, percent_of, sampling_interval};
pub use qr::{QrBitmap, QrCodeEncoder, QrEncoder};
pub use qr_sheet::{
    CELL_META_KEY, CellPosition, GridSpec, QrSheetRenderer, backside_cell, front_cell,
};
pub use stats::{
    ReleaseDateInfo, StatsBundle, ValidTrackRecord, compute_stats, histogram_from_counts,
    year_histogram, year_line_plot_data,
};
pub use stats_page::{StatRow, StatisticsPageRenderer, card_rows, generated_on, stat_rows};
pub use types::{Color, Margins, Pt, Size};
pub use worker::{
    CompletePayload, GeneratePayload, PdfWorker, WorkerError, WorkerRequest, WorkerResponse,
};

use chrono::{DateTime, Local};
use std::sync::Arc;

pub const DEFAULT_TITLE: &str = "QR Deck - QR Codes";

/// Injected sink for fatal errors, called once before the error is returned.
pub type ErrorReporter = Arc<dyn Fn(&QrDeckError) + Send + Sync>;

#[derive(Clone)]
pub struct QrDeck {
    settings: DeckSettings,
    debug: Option<Arc<DebugLogger>>,
    error_reporter: Option<ErrorReporter>,
}

#[derive(Clone)]
pub struct QrDeckBuilder {
    page_size: Size,
    margins: Margins,
    rows: u32,
    columns: u32,
    qr_size_mm: f32,
    title: String,
    generated_at: Option<DateTime<Local>>,
    scissor_lines: bool,
    debug_path: Option<std::path::PathBuf>,
    qr_encoder: Option<Arc<dyn QrEncoder>>,
    error_reporter: Option<ErrorReporter>,
}

impl QrDeck {
    pub fn builder() -> QrDeckBuilder {
        QrDeckBuilder::new()
    }

    pub fn grid(&self) -> GridSpec {
        self.settings.grid
    }

    pub fn title(&self) -> &str {
        &self.settings.title
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = self.debug.as_deref() {
            logger.emit_summary(context);
            logger.flush();
        }
    }

    fn report(&self, err: QrDeckError) -> QrDeckError {
        log::error!("{err}");
        if let Some(reporter) = self.error_reporter.as_deref() {
            reporter(&err);
        }
        err
    }

    fn pdf_options(&self) -> PdfOptions {
        PdfOptions {
            title: Some(self.settings.title.clone()),
        }
    }

    /// Statistics page followed by front/back QR sheets. Progress events are
    /// delivered in order; a failure aborts the whole run.
    pub fn generate(
        &self,
        playlists: &[Playlist],
        on_progress: impl FnMut(&ProgressEvent),
    ) -> Result<Document, QrDeckError> {
        Ok(self.generate_with_stats(playlists, on_progress)?.document)
    }

    pub fn generate_with_stats(
        &self,
        playlists: &[Playlist],
        mut on_progress: impl FnMut(&ProgressEvent),
    ) -> Result<GenerationOutput, QrDeckError> {
        let result = pipeline::run(
            &self.settings,
            self.debug.as_deref(),
            playlists,
            &mut on_progress,
        );
        self.emit_debug_summary("generate");
        result.map_err(|err| self.report(err))
    }

    pub fn render_pdf(&self, document: &Document) -> Result<Vec<u8>, QrDeckError> {
        pdf::document_to_pdf(document, &self.pdf_options())
            .map_err(|err| self.report(err.into()))
    }

    pub fn render_pdf_with_metrics(
        &self,
        document: &Document,
    ) -> Result<(Vec<u8>, DocumentMetrics), QrDeckError> {
        let mut metrics = DocumentMetrics::default();
        let bytes =
            pdf::document_to_pdf_with_metrics(document, &self.pdf_options(), Some(&mut metrics))
                .map_err(|err| self.report(err.into()))?;
        Ok((bytes, metrics))
    }

    pub fn render_pdf_to_writer<W: std::io::Write>(
        &self,
        document: &Document,
        writer: &mut W,
    ) -> Result<usize, QrDeckError> {
        pdf::document_to_pdf_to_writer(document, &self.pdf_options(), None, writer)
            .map_err(|err| self.report(err.into()))
    }

    pub fn render_pdf_to_file(
        &self,
        document: &Document,
        path: impl AsRef<std::path::Path>,
    ) -> Result<usize, QrDeckError> {
        let mut file = std::fs::File::create(path).map_err(|err| self.report(err.into()))?;
        self.render_pdf_to_writer(document, &mut file)
    }

    /// Generation and PDF serialization in one call.
    pub fn generate_pdf(
        &self,
        playlists: &[Playlist],
        on_progress: impl FnMut(&ProgressEvent),
    ) -> Result<Vec<u8>, QrDeckError> {
        let document = self.generate(playlists, on_progress)?;
        self.render_pdf(&document)
    }
}

impl Default for QrDeckBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QrDeckBuilder {
    pub fn new() -> Self {
        Self {
            page_size: Size::a4(),
            margins: Margins::from_mm(10.0, 20.0, 10.0, 20.0),
            rows: 5,
            columns: 4,
            qr_size_mm: 40.0,
            title: DEFAULT_TITLE.to_string(),
            generated_at: None,
            scissor_lines: true,
            debug_path: None,
            qr_encoder: None,
            error_reporter: None,
        }
    }

    pub fn page_size(mut self, size: Size) -> Self {
        self.page_size = size;
        self
    }

    pub fn margins(mut self, margins: Margins) -> Self {
        self.margins = margins;
        self
    }

    pub fn grid(mut self, rows: u32, columns: u32) -> Self {
        self.rows = rows;
        self.columns = columns;
        self
    }

    pub fn qr_size_mm(mut self, size: f32) -> Self {
        self.qr_size_mm = size;
        self
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn generated_at(mut self, timestamp: DateTime<Local>) -> Self {
        self.generated_at = Some(timestamp);
        self
    }

    pub fn scissor_lines(mut self, enabled: bool) -> Self {
        self.scissor_lines = enabled;
        self
    }

    // JSONL event trace of progress, page breaks, sheets and asset failures.
    pub fn debug_log(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn qr_encoder(mut self, encoder: Arc<dyn QrEncoder>) -> Self {
        self.qr_encoder = Some(encoder);
        self
    }

    pub fn error_reporter(mut self, reporter: ErrorReporter) -> Self {
        self.error_reporter = Some(reporter);
        self
    }

    pub fn build(self) -> Result<QrDeck, QrDeckError> {
        if self.page_size.width <= Pt::ZERO || self.page_size.height <= Pt::ZERO {
            return Err(QrDeckError::InvalidConfiguration(
                "page size must be positive".to_string(),
            ));
        }
        if self.rows == 0 || self.columns == 0 {
            return Err(QrDeckError::InvalidConfiguration(
                "grid requires at least one row and one column".to_string(),
            ));
        }
        if !self.qr_size_mm.is_finite() || self.qr_size_mm <= 0.0 {
            return Err(QrDeckError::InvalidConfiguration(
                "qr_size_mm must be > 0".to_string(),
            ));
        }
        let qr_size = Pt::from_mm(self.qr_size_mm);
        if qr_size * self.columns as i32 > self.page_size.width
            || qr_size * self.rows as i32 > self.page_size.height
        {
            return Err(QrDeckError::InvalidConfiguration(format!(
                "{}x{} grid of {}mm codes does not fit the page",
                self.rows, self.columns, self.qr_size_mm
            )));
        }
        let margins = self.margins;
        if margins.left + margins.right >= self.page_size.width
            || margins.top + margins.bottom >= self.page_size.height
        {
            return Err(QrDeckError::InvalidConfiguration(
                "margins leave no room for content".to_string(),
            ));
        }
        let debug = if let Some(path) = self.debug_path {
            Some(Arc::new(DebugLogger::new(path)?))
        } else {
            None
        };
        let encoder = self
            .qr_encoder
            .unwrap_or_else(|| Arc::new(QrCodeEncoder::default()));
        Ok(QrDeck {
            settings: DeckSettings {
                page_size: self.page_size,
                margins,
                grid: GridSpec {
                    rows: self.rows,
                    columns: self.columns,
                    qr_size,
                },
                title: self.title,
                generated_at: self.generated_at,
                scissor_lines: self.scissor_lines,
                encoder,
            },
            debug,
            error_reporter: self.error_reporter,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::debug::tests::temp_log_path;
    use crate::pipeline::tests::playlist;
    use chrono::TimeZone;
    use lopdf::Document as LoDocument;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn generate_pdf_produces_stats_page_and_paired_sheets() {
        let deck = QrDeck::builder()
            .generated_at(Local.with_ymd_and_hms(2024, 5, 14, 13, 5, 9).unwrap())
            .build()
            .unwrap();
        let bytes = deck
            .generate_pdf(&[playlist("a", 0, 10), playlist("b", 10, 20)], |_| {})
            .unwrap();

        let pdf = LoDocument::load_mem(&bytes).unwrap();
        assert_eq!(pdf.get_pages().len(), 5);

        let report = inspect_pdf_bytes(&bytes).unwrap();
        assert_eq!(report.sheet_count(), 2);
        assert_eq!(report.title.as_deref(), Some(DEFAULT_TITLE));
        require_deck_layout(&report).unwrap();
    }

    #[test]
    fn sheets_follow_a_statistics_section_spanning_two_pages() {
        let deck = QrDeck::builder().build().unwrap();
        let playlists: Vec<Playlist> = (0..12)
            .map(|i| playlist(&format!("list {i}"), i * 2, 2))
            .collect();
        let bytes = deck.generate_pdf(&playlists, |_| {}).unwrap();

        let report = inspect_pdf_bytes(&bytes).unwrap();
        // 24 codes at 20 per sheet: two sheets after two statistics pages.
        assert_eq!(report.page_count, 6);
        assert_eq!(report.sheet_count(), 2);
        require_deck_layout(&report).unwrap();
    }

    #[test]
    fn fixed_timestamp_makes_output_deterministic() {
        let deck = QrDeck::builder()
            .generated_at(Local.with_ymd_and_hms(2024, 5, 14, 13, 5, 9).unwrap())
            .build()
            .unwrap();
        let playlists = [playlist("a", 0, 7)];
        let first = deck.generate_pdf(&playlists, |_| {}).unwrap();
        let second = deck.generate_pdf(&playlists, |_| {}).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn builder_rejects_invalid_grids() {
        assert!(matches!(
            QrDeck::builder().grid(0, 4).build(),
            Err(QrDeckError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            QrDeck::builder().qr_size_mm(0.0).build(),
            Err(QrDeckError::InvalidConfiguration(_))
        ));
        // Six 40mm codes are wider than an A4 page.
        assert!(matches!(
            QrDeck::builder().grid(5, 6).build(),
            Err(QrDeckError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            QrDeck::builder().page_size(Size::from_mm(0.0, 297.0)).build(),
            Err(QrDeckError::InvalidConfiguration(_))
        ));
        let deck = QrDeck::builder().grid(3, 2).qr_size_mm(60.0).build().unwrap();
        assert_eq!(deck.grid().per_sheet(), 6);
    }

    #[test]
    fn custom_grid_changes_sheet_count() {
        let deck = QrDeck::builder().grid(2, 2).qr_size_mm(50.0).build().unwrap();
        let document = deck.generate(&[playlist("a", 0, 9)], |_| {}).unwrap();
        // 9 codes at 4 per sheet: 3 sheets of two pages each.
        assert_eq!(document.page_count(), 1 + 3 * 2);
    }

    #[test]
    fn error_reporter_sees_fatal_errors() {
        struct FailingEncoder;

        impl QrEncoder for FailingEncoder {
            fn encode(&self, _: &str) -> Result<QrBitmap, QrDeckError> {
                Err(QrDeckError::QrEncoding("unsupported payload".to_string()))
            }
        }

        let reported = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&reported);
        let deck = QrDeck::builder()
            .qr_encoder(Arc::new(FailingEncoder))
            .error_reporter(Arc::new(move |err: &QrDeckError| {
                assert!(matches!(err, QrDeckError::QrEncoding(_)));
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .build()
            .unwrap();

        let err = deck.generate_pdf(&[playlist("a", 0, 1)], |_| {}).unwrap_err();
        assert!(matches!(err, QrDeckError::QrEncoding(_)));
        assert_eq!(reported.load(Ordering::SeqCst), 1);

        deck.generate_pdf(&[], |_| {}).unwrap();
        assert_eq!(reported.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn metrics_cover_every_page() {
        let deck = QrDeck::builder().build().unwrap();
        let document = deck.generate(&[playlist("a", 0, 3)], |_| {}).unwrap();
        let (bytes, metrics) = deck.render_pdf_with_metrics(&document).unwrap();
        assert_eq!(metrics.pages.len(), 3);
        assert_eq!(metrics.total_bytes, bytes.len());
        // Three QR codes are drawn on the single front page.
        assert_eq!(metrics.pages[1].image_count, 3);
    }

    #[test]
    fn render_pdf_to_file_writes_the_same_bytes() {
        let deck = QrDeck::builder()
            .generated_at(Local.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .build()
            .unwrap();
        let document = deck.generate(&[playlist("a", 0, 2)], |_| {}).unwrap();
        let path = std::env::temp_dir().join(format!("qrdeck_lib_{}.pdf", std::process::id()));
        let written = deck.render_pdf_to_file(&document, &path).unwrap();
        let on_disk = std::fs::read(&path).unwrap();
        assert_eq!(written, on_disk.len());
        assert_eq!(on_disk, deck.render_pdf(&document).unwrap());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn debug_log_ends_with_summary() {
        let path = temp_log_path("lib");
        let deck = QrDeck::builder().debug_log(&path).build().unwrap();
        deck.generate(&[playlist("a", 0, 2)], |_| {}).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let last = text.lines().last().unwrap();
        let value: serde_json::Value = serde_json::from_str(last).unwrap();
        assert_eq!(value["type"], "debug.summary");
        let _ = std::fs::remove_file(&path);
    }
}
