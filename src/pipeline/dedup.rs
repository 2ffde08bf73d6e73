use std::collections::{HashMap, HashSet};

use crate::models::TrackRecord;

pub struct Deduplicated {
    pub records: Vec<TrackRecord>,
    pub collisions: usize,
}

/// Keep the first record per (artist_name, track_name), in arrival order.
pub fn dedup(records: Vec<TrackRecord>) -> Deduplicated {
    let mut seen: HashSet<(String, String)> = HashSet::with_capacity(records.len());
    let mut kept = Vec::with_capacity(records.len());
    let mut collisions = 0;

    for record in records {
        let key = (record.artist_name.clone(), record.track_name.clone());
        if seen.insert(key) {
            kept.push(record);
        } else {
            collisions += 1;
        }
    }

    Deduplicated {
        records: kept,
        collisions,
    }
}

/// Records that `dedup` would drop. Zero for an already deduplicated set.
pub fn collision_count(records: &[TrackRecord]) -> usize {
    let mut seen = HashSet::with_capacity(records.len());
    records.iter().filter(|r| !seen.insert(r.natural_key())).count()
}

/// Distinct (artist_name, track_name) pairs that occur more than once.
pub fn duplicated_key_count<'a, I>(keys: I) -> usize
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut counts: HashMap<(&str, &str), usize> = HashMap::new();
    for key in keys {
        *counts.entry(key).or_default() += 1;
    }
    counts.values().filter(|&&n| n > 1).count()
}
