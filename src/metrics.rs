use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::info;

/// Wall-clock timer for a network-bound phase.
///
/// Reports elapsed time and rows produced when dropped, so the numbers show up
/// even when the phase is cut short by an error.
pub struct PhaseTimer {
    phase: &'static str,
    started: Instant,
    requests: usize,
    rows: usize,
    finished: Option<Duration>,
}

impl PhaseTimer {
    pub fn start(phase: &'static str) -> Self {
        info!(phase, "Phase started");
        PhaseTimer {
            phase,
            started: Instant::now(),
            requests: 0,
            rows: 0,
            finished: None,
        }
    }

    pub fn record_request(&mut self, rows: usize) {
        self.requests += 1;
        self.rows += rows;
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Stop the clock and return the elapsed time. Reporting still happens on drop.
    pub fn finish(&mut self) -> Duration {
        *self.finished.get_or_insert_with(|| self.started.elapsed())
    }
}

impl Drop for PhaseTimer {
    fn drop(&mut self) {
        let elapsed = self.finish();
        info!(
            phase = self.phase,
            requests = self.requests,
            rows = self.rows,
            "Time to run {} phase: {}",
            self.phase,
            format_duration(elapsed)
        );
    }
}

#[derive(Debug, Default, Clone)]
pub struct SearchStats {
    pub requests: usize,
    pub empty_pages: usize,
    pub rows: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default, Clone)]
pub struct DedupStats {
    pub input: usize,
    pub duplicated_keys: usize,
    pub collisions: usize,
    pub output: usize,
}

#[derive(Debug, Default, Clone)]
pub struct LookupStats {
    pub requested: usize,
    pub batches: usize,
    pub emitted: usize,
    pub misses: usize,
    pub elapsed: Duration,
}

#[derive(Debug, Default, Clone)]
pub struct MergeStats {
    pub rows: usize,
    pub unmatched_tracks: usize,
    pub unmatched_features: usize,
    pub duplicate_feature_ids: usize,
    pub duplicate_track_ids: usize,
    /// Natural-key duplicates left after the join; zero unless dedup was bypassed.
    pub duplicated_keys_after_merge: usize,
}

/// Counts gathered over one pipeline run.
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    pub search: SearchStats,
    pub dedup: DedupStats,
    pub lookup: LookupStats,
    pub merge: MergeStats,
    pub output: Option<PathBuf>,
}

impl RunSummary {
    pub fn print(&self) {
        let s = &self.search;
        println!(
            "Search:  {} requests, {} tracks ({} empty pages) in {}",
            s.requests,
            s.rows,
            s.empty_pages,
            format_duration(s.elapsed)
        );
        let d = &self.dedup;
        println!(
            "Dedup:   {} -> {} tracks ({} duplicated artist/title pairs, {} dropped)",
            d.input, d.output, d.duplicated_keys, d.collisions
        );
        let l = &self.lookup;
        println!(
            "Lookup:  {} batches, {} of {} tracks with audio features ({} without) in {}",
            l.batches,
            l.emitted,
            l.requested,
            l.misses,
            format_duration(l.elapsed)
        );
        let m = &self.merge;
        println!(
            "Merge:   {} rows ({} tracks without features, {} features without track)",
            m.rows, m.unmatched_tracks, m.unmatched_features
        );
        if m.duplicate_feature_ids > 0 || m.duplicate_track_ids > 0 {
            println!(
                "         first match kept for {} duplicate feature ids, {} duplicate track ids",
                m.duplicate_feature_ids, m.duplicate_track_ids
            );
        }
        if m.duplicated_keys_after_merge > 0 {
            println!(
                "         {} artist/title pairs still duplicated after merge",
                m.duplicated_keys_after_merge
            );
        }
        if let Some(path) = &self.output {
            println!("Output:  {}", path.display());
        }
    }
}

pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
