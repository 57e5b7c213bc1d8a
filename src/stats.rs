use crate::model::{AlbumInfo, Playlist, ReleaseDatePrecision, TrackRecord};
use std::collections::{BTreeMap, HashMap};

/// Release date parsed according to the album's declared precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseDateInfo {
    Year { year: i32 },
    Month { year: i32, month: u8 },
    Day { year: i32, month: u8, day: u8 },
    Error,
}

impl ReleaseDateInfo {
    /// Year precision takes the leading component. Month and day precision
    /// take as many components as the date string carries, so the parsed
    /// precision always matches the component count. Empty, non-numeric or
    /// out-of-range parts yield `Error`.
    pub fn parse(raw: &str, precision: Option<ReleaseDatePrecision>) -> Self {
        let raw = raw.trim();
        if raw.is_empty() {
            return ReleaseDateInfo::Error;
        }
        let parts: Vec<&str> = raw.split('-').collect();
        match precision {
            Some(ReleaseDatePrecision::Year) => match parse_year(parts[0]) {
                Some(year) => ReleaseDateInfo::Year { year },
                None => ReleaseDateInfo::Error,
            },
            Some(ReleaseDatePrecision::Month | ReleaseDatePrecision::Day) => {
                parse_components(&parts).unwrap_or(ReleaseDateInfo::Error)
            }
            Some(ReleaseDatePrecision::Unknown) | None => ReleaseDateInfo::Error,
        }
    }

    pub fn from_album(album: &AlbumInfo) -> Self {
        Self::parse(&album.release_date, album.release_date_precision)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ReleaseDateInfo::Error)
    }

    pub fn year(&self) -> Option<i32> {
        match *self {
            ReleaseDateInfo::Year { year }
            | ReleaseDateInfo::Month { year, .. }
            | ReleaseDateInfo::Day { year, .. } => Some(year),
            ReleaseDateInfo::Error => None,
        }
    }

    pub fn precision(&self) -> Option<ReleaseDatePrecision> {
        match self {
            ReleaseDateInfo::Year { .. } => Some(ReleaseDatePrecision::Year),
            ReleaseDateInfo::Month { .. } => Some(ReleaseDatePrecision::Month),
            ReleaseDateInfo::Day { .. } => Some(ReleaseDatePrecision::Day),
            ReleaseDateInfo::Error => None,
        }
    }

    /// `YYYY`, `MM.YYYY` or `DD.MM.YYYY`.
    pub fn print_date(&self) -> Option<String> {
        match *self {
            ReleaseDateInfo::Year { year } => Some(format!("{year:04}")),
            ReleaseDateInfo::Month { year, month } => Some(format!("{month:02}.{year:04}")),
            ReleaseDateInfo::Day { year, month, day } => {
                Some(format!("{day:02}.{month:02}.{year:04}"))
            }
            ReleaseDateInfo::Error => None,
        }
    }
}

fn parse_year(part: &str) -> Option<i32> {
    let part = part.trim();
    if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    part.parse().ok()
}

fn parse_unit(part: &str, max: u8) -> Option<u8> {
    let part = part.trim();
    if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let value: u8 = part.parse().ok()?;
    (1..=max).contains(&value).then_some(value)
}

fn parse_components(parts: &[&str]) -> Option<ReleaseDateInfo> {
    match parts {
        [year] => Some(ReleaseDateInfo::Year {
            year: parse_year(year)?,
        }),
        [year, month] => Some(ReleaseDateInfo::Month {
            year: parse_year(year)?,
            month: parse_unit(month, 12)?,
        }),
        [year, month, day] => Some(ReleaseDateInfo::Day {
            year: parse_year(year)?,
            month: parse_unit(month, 12)?,
            day: parse_unit(day, 31)?,
        }),
        _ => None,
    }
}

/// A track whose release date parsed; the only kind that reaches QR sheets.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidTrackRecord {
    pub track: TrackRecord,
    pub release_date: ReleaseDateInfo,
    pub year: i32,
    pub print_date: String,
}

impl ValidTrackRecord {
    pub fn new(track: &TrackRecord) -> Option<Self> {
        let album = track.album.as_ref()?;
        if album.release_date.trim().is_empty() {
            return None;
        }
        let release_date = ReleaseDateInfo::from_album(album);
        let year = release_date.year()?;
        let print_date = release_date.print_date()?;
        Some(Self {
            track: track.clone(),
            release_date,
            year,
            print_date,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatsBundle {
    pub total_tracks: usize,
    pub total_unique_tracks: usize,
    pub total_valid_tracks: usize,
    pub ordered_valid_tracks: Vec<ValidTrackRecord>,
    pub year_counts: BTreeMap<i32, usize>,
}

impl StatsBundle {
    pub fn valid_years(&self) -> Vec<i32> {
        self.ordered_valid_tracks.iter().map(|t| t.year).collect()
    }
}

/// Flattens every playlist's tracks, deduplicates them by id and keeps the
/// ones with a usable release date.
///
/// Deduplication keeps the position of an id's first occurrence but the
/// record of its last one. Non-track items are skipped and never counted.
pub fn compute_stats(playlists: &[Playlist]) -> StatsBundle {
    let mut total_tracks = 0usize;
    let mut unique: Vec<&TrackRecord> = Vec::new();
    let mut index_by_id: HashMap<&str, usize> = HashMap::new();

    for track in playlists.iter().flat_map(Playlist::tracks) {
        total_tracks += 1;
        match index_by_id.get(track.id.as_str()) {
            Some(&idx) => unique[idx] = track,
            None => {
                index_by_id.insert(track.id.as_str(), unique.len());
                unique.push(track);
            }
        }
    }

    let ordered_valid_tracks: Vec<ValidTrackRecord> =
        unique.iter().filter_map(|t| ValidTrackRecord::new(t)).collect();

    log::debug!(
        "stats: {} tracks, {} unique, {} valid",
        total_tracks,
        unique.len(),
        ordered_valid_tracks.len()
    );

    let mut bundle = StatsBundle {
        total_tracks,
        total_unique_tracks: unique.len(),
        total_valid_tracks: ordered_valid_tracks.len(),
        ordered_valid_tracks,
        year_counts: BTreeMap::new(),
    };
    bundle.year_counts = year_line_plot_data(&bundle.valid_years());
    bundle
}

/// Year to count, ascending by year.
pub fn year_line_plot_data(years: &[i32]) -> BTreeMap<i32, usize> {
    let mut counts = BTreeMap::new();
    for year in years {
        *counts.entry(*year).or_insert(0) += 1;
    }
    counts
}

/// Groups years into bins of `bin_size` years, ordered by bin start. Labels
/// are `"1990"` for single-year bins and `"1990-1999"` otherwise.
pub fn year_histogram(years: &[i32], bin_size: u32) -> Vec<(String, usize)> {
    histogram_from_counts(&year_line_plot_data(years), bin_size)
}

/// Same binning as [`year_histogram`], starting from per-year counts.
pub fn histogram_from_counts(counts: &BTreeMap<i32, usize>, bin_size: u32) -> Vec<(String, usize)> {
    let bin_size = bin_size.max(1) as i32;
    let mut bins: BTreeMap<i32, usize> = BTreeMap::new();
    for (year, count) in counts {
        let start = year.div_euclid(bin_size) * bin_size;
        *bins.entry(start).or_insert(0) += count;
    }
    bins.into_iter()
        .map(|(start, count)| {
            let label = if bin_size == 1 {
                format!("{start}")
            } else {
                format!("{start}-{}", start + bin_size - 1)
            };
            (label, count)
        })
        .collect()
}
