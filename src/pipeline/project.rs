use crate::error::PipelineError;
use crate::models::{RawTrack, TrackRecord};

/// Flatten a search item into a track record.
///
/// The artist is the first credited artist. Missing fields fail the run
/// instead of being defaulted; `position` names the item in the error.
pub fn project(item: RawTrack, position: &str) -> Result<TrackRecord, PipelineError> {
    let RawTrack {
        id,
        name,
        popularity,
        artists,
    } = item;

    let track_id = id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PipelineError::schema(position, "track has no id"))?;
    let track_name = name.ok_or_else(|| PipelineError::schema(position, format!("track {} has no name", track_id)))?;
    let artist_name = artists
        .into_iter()
        .next()
        .ok_or_else(|| PipelineError::schema(position, format!("track {} has no artists", track_id)))?
        .name
        .ok_or_else(|| PipelineError::schema(position, format!("first artist of track {} has no name", track_id)))?;
    let popularity = popularity
        .ok_or_else(|| PipelineError::schema(position, format!("track {} has no popularity", track_id)))?;
    let popularity = u8::try_from(popularity)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| {
            PipelineError::schema(
                position,
                format!("track {} popularity {} outside 0..=100", track_id, popularity),
            )
        })?;

    Ok(TrackRecord {
        artist_name,
        track_name,
        track_id,
        popularity,
    })
}
