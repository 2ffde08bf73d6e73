use serde::Deserialize;
use serde_json::{Map, Value};

/// Field names of a track record, in output column order.
pub const TRACK_COLUMNS: [&str; 4] = ["artist_name", "track_name", "track_id", "popularity"];

/// Feature fields with no analytic value, removed before merging.
pub const DROPPED_FEATURE_FIELDS: [&str; 4] = ["analysis_url", "track_href", "type", "uri"];

/// Identifier field name used by the lookup API.
pub const FEATURE_ID_FIELD: &str = "id";

// ── Raw service shapes ──

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub items: Vec<RawTrack>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawTrack {
    pub id: Option<String>,
    pub name: Option<String>,
    pub popularity: Option<u32>,
    #[serde(default)]
    pub artists: Vec<RawArtist>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawArtist {
    pub name: Option<String>,
}

/// One lookup result as returned by the service, before normalization.
pub type RawFeatures = Map<String, Value>;

// ── Pipeline records ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackRecord {
    pub artist_name: String,
    pub track_name: String,
    pub track_id: String,
    pub popularity: u8,
}

impl TrackRecord {
    pub fn natural_key(&self) -> (&str, &str) {
        (&self.artist_name, &self.track_name)
    }
}

/// Audio features keyed by `track_id`, with the non-analytic fields removed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRecord {
    pub track_id: String,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergedRow {
    pub track: TrackRecord,
    pub features: Map<String, Value>,
}

#[derive(Debug, Clone, Default)]
pub struct MergedDataset {
    /// Feature columns in first-seen order, appended after `TRACK_COLUMNS`.
    pub feature_columns: Vec<String>,
    pub rows: Vec<MergedRow>,
}

impl MergedDataset {
    pub fn header(&self) -> Vec<&str> {
        TRACK_COLUMNS
            .iter()
            .copied()
            .chain(self.feature_columns.iter().map(String::as_str))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
