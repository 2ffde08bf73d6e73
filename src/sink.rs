use std::io::Write;
use std::path::Path;

use csv::Writer;
use serde_json::Value;
use tracing::info;

use crate::error::PipelineError;
use crate::models::MergedDataset;

/// Write the dataset as CSV, replacing any existing file at `path`.
pub fn write_csv(dataset: &MergedDataset, path: &Path) -> Result<(), PipelineError> {
    let sink_err = |source: csv::Error| PipelineError::Sink {
        path: path.to_path_buf(),
        source,
    };
    let writer = Writer::from_path(path).map_err(sink_err)?;
    write_rows(dataset, writer).map_err(sink_err)?;
    info!(path = %path.display(), rows = dataset.len(), "Wrote dataset");
    Ok(())
}

fn write_rows<W: Write>(dataset: &MergedDataset, mut writer: Writer<W>) -> Result<(), csv::Error> {
    writer.write_record(dataset.header())?;

    let mut record: Vec<String> = Vec::with_capacity(dataset.header().len());
    for row in &dataset.rows {
        record.clear();
        record.push(row.track.artist_name.clone());
        record.push(row.track.track_name.clone());
        record.push(row.track.track_id.clone());
        record.push(row.track.popularity.to_string());
        for column in &dataset.feature_columns {
            record.push(row.features.get(column).map(cell).unwrap_or_default());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
