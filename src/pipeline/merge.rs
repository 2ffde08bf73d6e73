use std::collections::{HashMap, HashSet};

use itertools::Itertools;
use tracing::warn;

use crate::metrics::MergeStats;
use crate::models::{FeatureRecord, MergedDataset, MergedRow, TrackRecord};

use super::dedup::duplicated_key_count;

/// Inner join of tracks and features on `track_id`, in track order.
///
/// Both sides are expected to carry unique ids. When they don't, the first
/// feature record per id wins and later tracks with an already joined id are
/// skipped, so rows never fan out.
pub fn merge(tracks: Vec<TrackRecord>, features: Vec<FeatureRecord>) -> (MergedDataset, MergeStats) {
    let mut stats = MergeStats::default();

    let mut by_id: HashMap<String, FeatureRecord> = HashMap::with_capacity(features.len());
    let mut feature_order: Vec<String> = Vec::with_capacity(features.len());
    for record in features {
        if by_id.contains_key(&record.track_id) {
            warn!(track_id = %record.track_id, "Duplicate feature record, keeping the first");
            stats.duplicate_feature_ids += 1;
            continue;
        }
        feature_order.push(record.track_id.clone());
        by_id.insert(record.track_id.clone(), record);
    }

    let mut joined: HashSet<String> = HashSet::with_capacity(by_id.len());
    let mut rows = Vec::with_capacity(tracks.len().min(by_id.len()));
    for track in tracks {
        if joined.contains(&track.track_id) {
            warn!(track_id = %track.track_id, "Duplicate track id, keeping the first match");
            stats.duplicate_track_ids += 1;
            continue;
        }
        match by_id.get(&track.track_id) {
            Some(features) => {
                joined.insert(track.track_id.clone());
                rows.push(MergedRow {
                    features: features.fields.clone(),
                    track,
                });
            }
            None => stats.unmatched_tracks += 1,
        }
    }

    stats.unmatched_features = feature_order.iter().filter(|id| !joined.contains(*id)).count();
    stats.rows = rows.len();
    stats.duplicated_keys_after_merge = duplicated_key_count(rows.iter().map(|r| r.track.natural_key()));

    let feature_columns = rows
        .iter()
        .flat_map(|r| r.features.keys())
        .unique()
        .cloned()
        .collect();

    (MergedDataset { feature_columns, rows }, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Map};

    fn track(id: &str, artist: &str, title: &str) -> TrackRecord {
        TrackRecord {
            artist_name: artist.into(),
            track_name: title.into(),
            track_id: id.into(),
            popularity: 1,
        }
    }

    fn features(id: &str, energy: f64) -> FeatureRecord {
        let mut fields = Map::new();
        fields.insert("energy".into(), json!(energy));
        fields.insert("tempo".into(), json!(120.0));
        FeatureRecord {
            track_id: id.into(),
            fields,
        }
    }

    fn ids(ds: &MergedDataset) -> Vec<&str> {
        ds.rows.iter().map(|r| r.track.track_id.as_str()).collect()
    }

    #[test]
    fn keeps_exactly_the_intersection() {
        let tracks = vec![track("a", "A", "1"), track("b", "B", "2"), track("c", "C", "3")];
        let feats = vec![features("c", 0.3), features("x", 0.9), features("a", 0.1)];
        let (ds, stats) = merge(tracks, feats);

        assert_eq!(ids(&ds), vec!["a", "c"]);
        assert_eq!(stats.rows, 2);
        assert_eq!(stats.unmatched_tracks, 1);
        assert_eq!(stats.unmatched_features, 1);
        assert_eq!(ds.rows[0].features["energy"], json!(0.1));
    }

    #[test]
    fn header_lists_track_fields_then_features() {
        let (ds, _) = merge(vec![track("a", "A", "1")], vec![features("a", 0.5)]);
        assert_eq!(
            ds.header(),
            vec!["artist_name", "track_name", "track_id", "popularity", "energy", "tempo"]
        );
    }

    #[test]
    fn duplicate_feature_ids_use_first_match() {
        let (ds, stats) = merge(
            vec![track("a", "A", "1")],
            vec![features("a", 0.1), features("a", 0.9)],
        );
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.rows[0].features["energy"], json!(0.1));
        assert_eq!(stats.duplicate_feature_ids, 1);
    }

    #[test]
    fn duplicate_track_ids_do_not_fan_out() {
        let (ds, stats) = merge(
            vec![track("a", "A", "1"), track("a", "A2", "1b")],
            vec![features("a", 0.1)],
        );
        assert_eq!(ds.len(), 1);
        assert_eq!(ds.rows[0].track.artist_name, "A");
        assert_eq!(stats.duplicate_track_ids, 1);
    }

    #[test]
    fn empty_sides_yield_empty_dataset() {
        let (ds, stats) = merge(vec![track("a", "A", "1")], Vec::new());
        assert!(ds.is_empty());
        assert!(ds.feature_columns.is_empty());
        assert_eq!(stats.unmatched_tracks, 1);
        assert_eq!(ds.header().len(), 4);
    }
}
