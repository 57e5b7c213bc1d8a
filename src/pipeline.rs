use crate::canvas::{Canvas, Document};
use crate::debug::DebugLogger;
use crate::error::QrDeckError;
use crate::layout::DocumentLayoutEngine;
use crate::model::{Playlist, PlaylistSummary};
use crate::progress::{ProgressEvent, ProgressReporter, ProgressSection};
use crate::qr::QrEncoder;
use crate::qr_sheet::{GridSpec, QrSheetRenderer};
use crate::stats::{StatsBundle, compute_stats};
use crate::stats_page::StatisticsPageRenderer;
use crate::types::{Margins, Size};
use chrono::{DateTime, Local};
use serde_json::json;
use std::sync::Arc;

/// Resolved engine settings shared by every generation run.
#[derive(Clone)]
pub(crate) struct DeckSettings {
    pub page_size: Size,
    pub margins: Margins,
    pub grid: GridSpec,
    pub title: String,
    pub generated_at: Option<DateTime<Local>>,
    pub scissor_lines: bool,
    pub encoder: Arc<dyn QrEncoder>,
}

#[derive(Debug, Clone)]
pub struct GenerationOutput {
    pub document: Document,
    pub stats: StatsBundle,
}

/// One single-shot run: statistics page, forced page break, then QR sheets.
/// Any error aborts the run; nothing partial is returned.
pub(crate) fn run(
    settings: &DeckSettings,
    debug: Option<&DebugLogger>,
    playlists: &[Playlist],
    on_progress: &mut dyn FnMut(&ProgressEvent),
) -> Result<GenerationOutput, QrDeckError> {
    let mut progress = ProgressReporter::new(on_progress, debug);
    progress.emit(ProgressSection::CalculatingStats, 0);

    let stats = compute_stats(playlists);
    let summaries: Vec<PlaylistSummary> = playlists.iter().map(PlaylistSummary::from).collect();
    let generated_at = settings.generated_at.unwrap_or_else(Local::now);

    let mut canvas = Canvas::new(settings.page_size);
    let failed_images = {
        let mut engine = DocumentLayoutEngine::new(&mut canvas, settings.margins).with_debug(debug);
        StatisticsPageRenderer::new(&settings.title, generated_at).render(
            &mut engine,
            &stats,
            &summaries,
        );
        engine.new_page();
        engine.failed_images()
    };
    if failed_images > 0 {
        log::info!("{failed_images} playlist cover(s) rendered without image");
    }
    progress.complete(ProgressSection::CalculatingStats);

    progress.emit(ProgressSection::AddingQrCodes, 0);
    QrSheetRenderer::new(settings.grid, settings.encoder.as_ref())
        .scissor_lines(settings.scissor_lines)
        .with_debug(debug)
        .render(&mut canvas, &stats.ordered_valid_tracks, &mut |percent| {
            progress.emit(ProgressSection::AddingQrCodes, percent)
        })?;
    progress.complete(ProgressSection::AddingQrCodes);

    let document = canvas.finish();
    if let Some(debug) = debug {
        debug.event(
            "document.done",
            json!({
                "pages": document.page_count(),
                "valid_tracks": stats.total_valid_tracks,
                "images": document.images.len(),
            }),
        );
    }
    log::info!(
        "generated {} pages for {} valid of {} tracks",
        document.page_count(),
        stats.total_valid_tracks,
        stats.total_tracks
    );
    Ok(GenerationOutput { document, stats })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::debug::tests::temp_log_path;
    use crate::qr::{QrBitmap, QrCodeEncoder};
    use serde_json::{Value, json};

    pub(crate) fn playlist(name: &str, first_id: usize, count: usize) -> Playlist {
        let items: Vec<Value> = (first_id..first_id + count)
            .map(|i| {
                json!({ "track": {
                    "id": format!("t{i}"),
                    "uri": format!("spotify:track:t{i}"),
                    "name": format!("Track {i}"),
                    "type": "track",
                    "artists": [{ "name": format!("Artist {}", i % 7) }],
                    "album": {
                        "release_date": format!("{}-{:02}-{:02}", 1960 + i % 60, 1 + i % 12, 1 + i % 28),
                        "release_date_precision": "day"
                    }
                }})
            })
            .collect();
        serde_json::from_value(json!({
            "id": name,
            "name": name,
            "owner": { "display_name": "Owner" },
            "tracks": { "total": count },
            "trackInfos": items,
        }))
        .unwrap()
    }

    pub(crate) fn settings() -> DeckSettings {
        DeckSettings {
            page_size: Size::a4(),
            margins: Margins::from_mm(10.0, 20.0, 10.0, 20.0),
            grid: GridSpec::default(),
            title: "QR Deck - QR Codes".to_string(),
            generated_at: None,
            scissor_lines: true,
            encoder: Arc::new(QrCodeEncoder::default()),
        }
    }

    fn run_collecting(
        settings: &DeckSettings,
        playlists: &[Playlist],
    ) -> (Result<GenerationOutput, QrDeckError>, Vec<ProgressEvent>) {
        let mut events = Vec::new();
        let result = run(settings, None, playlists, &mut |event| events.push(*event));
        (result, events)
    }

    #[test]
    fn thirty_tracks_make_two_sheets() {
        let playlists = vec![playlist("a", 0, 10), playlist("b", 10, 20)];
        let (result, _) = run_collecting(&settings(), &playlists);
        let output = result.unwrap();
        assert_eq!(output.stats.total_tracks, 30);
        assert_eq!(output.stats.total_unique_tracks, 30);
        assert_eq!(output.stats.total_valid_tracks, 30);
        assert_eq!(output.document.page_count(), 1 + 2 * 2);
    }

    #[test]
    fn progress_is_monotonic_and_sections_start_at_zero() {
        let playlists = vec![playlist("a", 0, 10), playlist("b", 10, 20)];
        let (result, events) = run_collecting(&settings(), &playlists);
        result.unwrap();

        assert_eq!(
            events.first(),
            Some(&ProgressEvent {
                section: ProgressSection::CalculatingStats,
                percent: 0
            })
        );
        assert_eq!(
            events.last(),
            Some(&ProgressEvent {
                section: ProgressSection::AddingQrCodes,
                percent: 100
            })
        );
        for pair in events.windows(2) {
            if pair[0].section == pair[1].section {
                assert!(pair[0].percent <= pair[1].percent);
            } else {
                assert_eq!(pair[1].percent, 0);
            }
        }
        // Stats start and end, QR start, then one event per code.
        assert_eq!(events.len(), 3 + 30);
    }

    #[test]
    fn no_valid_tracks_yields_stats_page_only() {
        let mut undated = playlist("a", 0, 3);
        for item in &mut undated.items {
            if let Some(crate::model::TrackItem::Track(track)) = item.track.as_mut() {
                if let Some(album) = track.album.as_mut() {
                    album.release_date.clear();
                }
            }
        }
        let (result, events) = run_collecting(&settings(), &[undated]);
        let output = result.unwrap();
        assert_eq!(output.stats.total_tracks, 3);
        assert_eq!(output.stats.total_valid_tracks, 0);
        assert_eq!(output.document.page_count(), 1);
        let percents: Vec<u8> = events.iter().map(|e| e.percent).collect();
        assert_eq!(percents, vec![0, 100, 0, 100]);
    }

    struct FailingEncoder;

    impl QrEncoder for FailingEncoder {
        fn encode(&self, payload: &str) -> Result<QrBitmap, QrDeckError> {
            Err(QrDeckError::QrEncoding(format!("refused {payload}")))
        }
    }

    #[test]
    fn encoder_failure_aborts_the_run() {
        let mut settings = settings();
        settings.encoder = Arc::new(FailingEncoder);
        let (result, events) = run_collecting(&settings, &[playlist("a", 0, 2)]);
        assert!(matches!(result, Err(QrDeckError::QrEncoding(_))));
        assert_ne!(events.last().map(|e| e.percent), Some(100));
    }

    #[test]
    fn debug_trace_records_pipeline_events() {
        let path = temp_log_path("pipeline");
        let logger = DebugLogger::new(&path).unwrap();
        let mut sink = |_: &ProgressEvent| {};
        run(&settings(), Some(&logger), &[playlist("a", 0, 5)], &mut sink).unwrap();
        logger.flush();
        let text = std::fs::read_to_string(&path).unwrap();
        let kinds: Vec<String> = text
            .lines()
            .map(|line| serde_json::from_str::<Value>(line).unwrap()["type"].as_str().unwrap().to_string())
            .collect();
        assert!(kinds.iter().any(|k| k == "progress"));
        assert!(kinds.iter().any(|k| k == "page.break"));
        assert!(kinds.iter().any(|k| k == "sheet.back"));
        assert_eq!(kinds.last().map(String::as_str), Some("document.done"));
        let _ = std::fs::remove_file(&path);
    }
}
