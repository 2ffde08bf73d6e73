use indicatif::ProgressBar;
use serde_json::Value;
use tracing::debug;

use crate::catalog::CatalogService;
use crate::error::PipelineError;
use crate::metrics::{LookupStats, PhaseTimer};
use crate::models::{FeatureRecord, RawFeatures, DROPPED_FEATURE_FIELDS, FEATURE_ID_FIELD, TRACK_COLUMNS};

/// Look up audio features for `ids` in contiguous batches of at most `batch_size`.
///
/// Misses are counted, not raised. A failed batch aborts the run; `stats`
/// already holds the counts of every batch that completed before it.
pub fn enrich<C: CatalogService + ?Sized>(
    service: &C,
    ids: &[String],
    batch_size: usize,
    stats: &mut LookupStats,
    timer: &mut PhaseTimer,
    pb: &ProgressBar,
) -> Result<Vec<FeatureRecord>, PipelineError> {
    let mut records = Vec::with_capacity(ids.len());

    let batch_size = batch_size.max(1);
    for (batch, chunk) in ids.chunks(batch_size).enumerate() {
        let first = batch * batch_size;
        let last = first + chunk.len() - 1;
        let position = || format!("batch {} (ids {}..={})", batch, first, last);

        let slots = service
            .audio_features(chunk)
            .map_err(|source| PipelineError::Lookup {
                batch,
                first,
                last,
                source,
            })?;

        if slots.len() != chunk.len() {
            return Err(PipelineError::schema(
                position(),
                format!("expected {} results, service returned {}", chunk.len(), slots.len()),
            ));
        }

        let mut found = Vec::with_capacity(chunk.len());
        let mut missing = 0usize;
        for slot in slots {
            match slot {
                Some(raw) => found.push(normalize(raw).map_err(|reason| PipelineError::schema(position(), reason))?),
                None => missing += 1,
            }
        }

        let emitted = found.len();
        records.extend(found);
        stats.batches += 1;
        stats.emitted += emitted;
        stats.misses += missing;
        debug!(batch, emitted, missing, "Fetched feature batch");
        timer.record_request(emitted);
        pb.inc(chunk.len() as u64);
    }

    Ok(records)
}

/// Rename the generic id to `track_id` and drop the non-analytic fields.
pub fn normalize(mut raw: RawFeatures) -> Result<FeatureRecord, String> {
    let track_id = match raw.shift_remove(FEATURE_ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => id,
        Some(other) => return Err(format!("feature record has non-string id {}", other)),
        None => return Err("feature record has no id".to_string()),
    };
    for field in DROPPED_FEATURE_FIELDS {
        raw.shift_remove(field);
    }
    // Track columns come from the search result; a feature field of the same name would repeat them.
    for field in TRACK_COLUMNS {
        if raw.shift_remove(field).is_some() {
            debug!(track_id = %track_id, field, "Dropped feature field shadowing a track column");
        }
    }
    Ok(FeatureRecord {
        track_id,
        fields: raw,
    })
}
