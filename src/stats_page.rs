//! First page(s) of the deck: title, statistics table, year distribution and
//! one card per playlist.

use crate::font::{self, FontStyle};
use crate::layout::{
    DEFAULT_FONT_SIZE, DocumentLayoutEngine, Histogram, ImageTextCard, LinePlot, Spacing,
    TextAlign, TextRowOptions,
};
use crate::model::PlaylistSummary;
use crate::stats::{StatsBundle, histogram_from_counts};
use crate::types::Pt;
use chrono::{DateTime, Local};

const TITLE_FONT_SIZE: f32 = 22.0;
const SUBTITLE_FONT_SIZE: f32 = 14.0;
const HISTOGRAM_BIN_FONT_SIZE: f32 = 10.0;
const LABEL_VALUE_SEPARATOR: &str = " : ";
const VALUE_DESCRIPTION_SEPARATOR: &str = "  -  ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatRow {
    pub label: String,
    pub value: String,
    pub description: String,
}

impl StatRow {
    pub fn new(label: &str, value: impl ToString, description: &str) -> Self {
        Self {
            label: label.to_string(),
            value: value.to_string(),
            description: description.to_string(),
        }
    }
}

/// The three counters shown in the statistics table.
pub fn stat_rows(stats: &StatsBundle) -> Vec<StatRow> {
    vec![
        StatRow::new(
            "Total tracks",
            stats.total_tracks,
            "Amount of tracks in all selected playlists.",
        ),
        StatRow::new(
            "Unique tracks",
            stats.total_unique_tracks,
            "Removed duplicate tracks when combining playlists.",
        ),
        StatRow::new(
            "Valid tracks",
            stats.total_valid_tracks,
            "Tracks which have a release date!",
        ),
    ]
}

pub fn generated_on(timestamp: &DateTime<Local>) -> String {
    format!("Generated on {}", timestamp.format("%d.%m.%Y, %H:%M:%S"))
}

pub fn card_rows(playlist: &PlaylistSummary) -> Vec<String> {
    vec![
        format!("Playlist: {}", playlist.name),
        format!("Owner: {}", playlist.owner),
        format!("Tracks: {}", playlist.total_tracks),
    ]
}

#[derive(Debug, Clone)]
pub struct StatisticsPageRenderer<'a> {
    pub title: &'a str,
    pub generated_at: DateTime<Local>,
}

impl<'a> StatisticsPageRenderer<'a> {
    pub fn new(title: &'a str, generated_at: DateTime<Local>) -> Self {
        Self {
            title,
            generated_at,
        }
    }

    /// Draws everything from the cursor on. The caller decides what follows;
    /// no page break is added at the end.
    pub fn render(
        &self,
        engine: &mut DocumentLayoutEngine<'_>,
        stats: &StatsBundle,
        playlists: &[PlaylistSummary],
    ) {
        let center = engine.cursor().page_size.width / 2.0;
        engine.add_text_row(self.title, TextRowOptions::centered(center, TITLE_FONT_SIZE));
        engine.add_text_row(
            &generated_on(&self.generated_at),
            TextRowOptions::centered(center, SUBTITLE_FONT_SIZE),
        );
        engine.add_text_row("Statistics", TextRowOptions::default());
        engine.add_horizontal_line();
        add_stat_rows(engine, &stat_rows(stats), Pt::from_f32(DEFAULT_FONT_SIZE));
        engine.add_spacing(Spacing::default());

        if stats.year_counts.len() < 2 {
            let bins = histogram_from_counts(&stats.year_counts, 1);
            let mut histogram = Histogram::new("Year distribution", &bins);
            histogram.bin_font_size = Pt::from_f32(HISTOGRAM_BIN_FONT_SIZE);
            engine.add_histogram(histogram);
        } else {
            engine.add_line_plot(LinePlot::new("Year distribution", &stats.year_counts));
        }

        engine.add_text_row(
            "Playlist Information",
            TextRowOptions::centered(center, SUBTITLE_FONT_SIZE),
        );
        for playlist in playlists {
            engine.add_spacing(Spacing::default());
            engine.add_image_text_card(ImageTextCard::new(
                playlist.cover_image.as_deref(),
                card_rows(playlist),
            ));
        }
    }
}

/// Label column, separator, right-aligned value column, description.
fn add_stat_rows(engine: &mut DocumentLayoutEngine<'_>, rows: &[StatRow], font_size: Pt) {
    let widest = |pick: fn(&StatRow) -> &str| {
        rows.iter()
            .map(|row| font::text_width(FontStyle::Normal, font_size, pick(row)))
            .fold(Pt::ZERO, Pt::max)
    };
    let label_width = widest(|row| row.label.as_str());
    let value_width = widest(|row| row.value.as_str());
    let separator_width = font::text_width(FontStyle::Normal, font_size, LABEL_VALUE_SEPARATOR);

    let x = engine.cursor().margins.left;
    let value_right = x + label_width + separator_width + value_width;
    let row_height = font::text_height(font_size);
    for row in rows {
        engine.add_page_if_needed(row_height);
        let baseline = engine.cursor().y + row_height;
        engine.draw_text(&row.label, x, baseline, font_size, FontStyle::Normal, TextAlign::Left);
        engine.draw_text(
            LABEL_VALUE_SEPARATOR,
            x + label_width,
            baseline,
            font_size,
            FontStyle::Normal,
            TextAlign::Left,
        );
        engine.draw_text(&row.value, value_right, baseline, font_size, FontStyle::Normal, TextAlign::Right);
        engine.draw_text(
            &format!("{VALUE_DESCRIPTION_SEPARATOR}{}", row.description),
            value_right,
            baseline,
            font_size,
            FontStyle::Normal,
            TextAlign::Left,
        );
        engine.add_spacing(Spacing::Height(row_height + engine.line_spacing()));
    }
}
