//! Search → project → dedup → feature lookup → merge.
//!
//! Each stage hands an owned sequence to the next. The two network-bound
//! phases are timed; their numbers are reported even when they fail.

pub mod dedup;
pub mod enrich;
pub mod fetch;
pub mod merge;
pub mod project;

#[cfg(test)]
pub(crate) mod testing;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::catalog::{CatalogService, SearchQuery};
use crate::error::PipelineError;
use crate::metrics::{LookupStats, PhaseTimer, RunSummary, SearchStats};
use crate::models::{FeatureRecord, MergedDataset, TrackRecord};
use crate::settings::{EmptyPagePolicy, Settings};

use fetch::{PageFetcher, PagePlan};

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub query: SearchQuery,
    pub plan: PagePlan,
    pub empty_page_policy: EmptyPagePolicy,
    pub batch_size: usize,
    pub show_progress: bool,
}

impl PipelineOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        PipelineOptions {
            query: SearchQuery {
                predicate: settings.query.clone(),
                result_type: settings.result_type.clone(),
            },
            plan: PagePlan {
                page_size: settings.page_size,
                total: settings.total_results,
            },
            empty_page_policy: settings.empty_page_policy,
            batch_size: settings.batch_size,
            show_progress: settings.show_progress,
        }
    }
}

/// Run every stage up to, but not including, writing the dataset.
pub fn build_dataset<C: CatalogService + ?Sized>(
    service: &C,
    opts: &PipelineOptions,
    summary: &mut RunSummary,
) -> Result<MergedDataset, PipelineError> {
    let tracks = fetch_tracks(service, opts, &mut summary.search)?;

    summary.dedup.input = tracks.len();
    summary.dedup.duplicated_keys = dedup::duplicated_key_count(tracks.iter().map(TrackRecord::natural_key));
    let deduped = dedup::dedup(tracks);
    summary.dedup.collisions = deduped.collisions;
    summary.dedup.output = deduped.records.len();
    info!(
        kept = deduped.records.len(),
        dropped = deduped.collisions,
        remaining_collisions = dedup::collision_count(&deduped.records),
        "Removed duplicate artist/title pairs"
    );

    let ids: Vec<String> = deduped.records.iter().map(|r| r.track_id.clone()).collect();
    let features = lookup_features(service, &ids, opts, &mut summary.lookup)?;

    let (dataset, merge_stats) = merge::merge(deduped.records, features);
    info!(
        rows = merge_stats.rows,
        unmatched_tracks = merge_stats.unmatched_tracks,
        unmatched_features = merge_stats.unmatched_features,
        "Merged tracks with audio features"
    );
    summary.merge = merge_stats;
    Ok(dataset)
}

fn fetch_tracks<C: CatalogService + ?Sized>(
    service: &C,
    opts: &PipelineOptions,
    stats: &mut SearchStats,
) -> Result<Vec<TrackRecord>, PipelineError> {
    let mut timer = PhaseTimer::start("search");
    let pb = progress_bar(opts.show_progress, opts.plan.total as u64);

    let mut tracks = Vec::with_capacity(opts.plan.total);
    let result = (|| -> Result<(), PipelineError> {
        for page in PageFetcher::new(service, &opts.query, opts.plan, opts.empty_page_policy) {
            let page = page?;
            let page_len = page.items.len();
            if page_len == 0 {
                stats.empty_pages += 1;
            }
            for (item_index, item) in page.items.into_iter().enumerate() {
                let position = format!("offset {} item {}", page.offset, item_index);
                tracks.push(project::project(item, &position)?);
            }
            timer.record_request(page_len);
            pb.inc(page_len as u64);
        }
        Ok(())
    })();

    pb.finish_and_clear();
    stats.requests = timer.requests();
    stats.rows = tracks.len();
    stats.elapsed = timer.finish();
    result.map(|()| tracks)
}

fn lookup_features<C: CatalogService + ?Sized>(
    service: &C,
    ids: &[String],
    opts: &PipelineOptions,
    stats: &mut LookupStats,
) -> Result<Vec<FeatureRecord>, PipelineError> {
    let mut timer = PhaseTimer::start("lookup");
    let pb = progress_bar(opts.show_progress, ids.len() as u64);
    stats.requested = ids.len();

    let result = enrich::enrich(service, ids, opts.batch_size, stats, &mut timer, &pb);

    pb.finish_and_clear();
    stats.elapsed = timer.finish();
    info!(
        misses = stats.misses,
        "Number of tracks where no audio features were available: {}",
        stats.misses
    );
    result
}

fn progress_bar(visible: bool, len: u64) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}
