//! Playlist and track records as delivered by the streaming API. Field names
//! follow the API's JSON so fetched pages can be deserialized directly.

use crate::error::QrDeckError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReleaseDatePrecision {
    Year,
    Month,
    Day,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlbumInfo {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub album_type: String,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub release_date: String,
    #[serde(default)]
    pub release_date_precision: Option<ReleaseDatePrecision>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRef {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub id: String,
    pub uri: String,
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub explicit: bool,
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: Option<AlbumInfo>,
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl TrackRecord {
    pub fn artist_names(&self) -> String {
        self.artists
            .iter()
            .map(|artist| artist.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowRef {
    #[serde(default)]
    pub id: String,
}

/// Anything in a playlist that is not shaped like a track (podcast episodes).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OtherItem {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub show: Option<ShowRef>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TrackItem {
    Track(TrackRecord),
    Other(OtherItem),
}

impl TrackItem {
    /// Structural track check: an album is present or the item says it is a track.
    pub fn as_track(&self) -> Option<&TrackRecord> {
        match self {
            TrackItem::Track(track)
                if track.album.is_some() || track.kind.as_deref() == Some("track") =>
            {
                Some(track)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<TrackItem>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrackTotal {
    #[serde(default)]
    pub total: u32,
}

/// A playlist with every page of its items already fetched and concatenated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub images: Vec<ImageRef>,
    #[serde(default)]
    pub tracks: TrackTotal,
    #[serde(rename = "trackInfos", default)]
    pub items: Vec<PlaylistItem>,
}

impl Playlist {
    pub fn tracks(&self) -> impl Iterator<Item = &TrackRecord> {
        self.items
            .iter()
            .filter_map(|item| item.track.as_ref())
            .filter_map(TrackItem::as_track)
    }
}

/// What the statistics page shows for one playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistSummary {
    pub name: String,
    pub owner: String,
    // The API lists the largest image first.
    pub cover_image: Option<String>,
    pub total_tracks: u32,
}

impl From<&Playlist> for PlaylistSummary {
    fn from(playlist: &Playlist) -> Self {
        Self {
            name: playlist.name.clone(),
            owner: playlist.owner.display_name.clone().unwrap_or_default(),
            cover_image: playlist.images.first().map(|image| image.url.clone()),
            total_tracks: playlist.tracks.total,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PlaylistsInput {
    List(Vec<Playlist>),
    Wrapped { playlists: Vec<Playlist> },
}

/// Reads a bare JSON array of playlists or an object with a `playlists` array.
pub fn parse_playlists(json: &str) -> Result<Vec<Playlist>, QrDeckError> {
    let playlists = match serde_json::from_str::<PlaylistsInput>(json) {
        Ok(PlaylistsInput::List(playlists)) | Ok(PlaylistsInput::Wrapped { playlists }) => playlists,
        // Re-parse as a plain list to surface a precise error location.
        Err(_) => serde_json::from_str::<Vec<Playlist>>(json)?,
    };
    Ok(playlists)
}
