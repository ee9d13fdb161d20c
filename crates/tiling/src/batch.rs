//! Bounded batch driver over every tile of a directory

use crate::config::PipelineConfig;
use crate::paths::WorkDirs;
use crate::pipeline::{Pipeline, TileOutcome};
use lidartile_core::{Error, Result};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Worker count for a batch: one core is left free, and a positive
/// `cpu_limit` caps the result.
pub fn select_num_threads(cpu_limit: Option<usize>) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cap_threads(cores, cpu_limit)
}

fn cap_threads(cores: usize, cpu_limit: Option<usize>) -> usize {
    let free = cores.saturating_sub(1).max(1);
    match cpu_limit {
        Some(limit) if limit > 0 => free.min(limit),
        _ => free,
    }
}

/// `.las` and `.laz` files of `dir`, sorted by name
pub fn list_point_clouds(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_cloud = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("las") || e.eq_ignore_ascii_case("laz"))
            .unwrap_or(false);
        if is_cloud && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Outcome of one tile of a batch
#[derive(Debug)]
pub struct TileResult {
    pub input: PathBuf,
    /// Error message when the tile failed
    pub outcome: std::result::Result<TileOutcome, String>,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    /// In input order
    pub tiles: Vec<TileResult>,
    pub threads: usize,
    pub elapsed: Duration,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.tiles.iter().filter(|t| t.outcome.is_ok()).count()
    }

    pub fn failed(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.tiles.iter().filter_map(|t| match &t.outcome {
            Ok(_) => None,
            Err(msg) => Some((t.input.as_path(), msg.as_str())),
        })
    }
}

/// Run every tile of `pipeline.dirs.input` with the default pipeline
pub fn run_batch(dirs: &WorkDirs, config: &PipelineConfig) -> Result<BatchReport> {
    let pipeline = Pipeline::new(config.clone(), dirs.clone())?;
    run_batch_with(&pipeline, |_, _| {})
}

/// Run every tile of `pipeline.dirs.input` on a pool bounded by
/// [`select_num_threads`]. `on_done` is called from the worker threads as
/// soon as a tile finishes; a failing tile never stops the others.
pub fn run_batch_with<F>(pipeline: &Pipeline, on_done: F) -> Result<BatchReport>
where
    F: Fn(&Path, &std::result::Result<TileOutcome, String>) + Sync,
{
    let start = Instant::now();
    let files = list_point_clouds(&pipeline.dirs.input)?;
    let threads = select_num_threads(pipeline.config.cpu_limit);
    info!(
        "Processing {} tiles from {} with {} workers",
        files.len(),
        pipeline.dirs.input.display(),
        threads
    );

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| Error::Other(format!("cannot build worker pool: {e}")))?;

    let tiles: Vec<TileResult> = pool.install(|| {
        files
            .par_iter()
            .map(|input| {
                let outcome = pipeline.run_tile(input).map_err(|e| e.to_string());
                if let Err(msg) = &outcome {
                    warn!("{}: {}", input.display(), msg);
                }
                on_done(input, &outcome);
                TileResult {
                    input: input.clone(),
                    outcome,
                }
            })
            .collect()
    });

    let report = BatchReport {
        tiles,
        threads,
        elapsed: start.elapsed(),
    };
    info!(
        "Batch done in {:.2?}: {} succeeded, {} failed",
        report.elapsed,
        report.succeeded(),
        report.tiles.len() - report.succeeded()
    );
    debug!("Batch driver pid {}", std::process::id());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_selection() {
        assert_eq!(cap_threads(8, None), 7);
        assert_eq!(cap_threads(8, Some(0)), 7);
        assert_eq!(cap_threads(8, Some(3)), 3);
        assert_eq!(cap_threads(8, Some(32)), 7);
        assert_eq!(cap_threads(1, None), 1);
        assert!(select_num_threads(None) >= 1);
        assert_eq!(select_num_threads(Some(1)), 1);
    }

    #[test]
    fn test_list_point_clouds() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.laz", "a.LAS", "notes.txt", "c.tif"] {
            std::fs::write(dir.path().join(name), b"").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.las")).unwrap();

        let files = list_point_clouds(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.LAS", "b.laz"]);
    }

    #[test]
    fn test_failures_are_collected() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        std::fs::write(input.join("not_a_tile.las"), b"").unwrap();
        std::fs::write(input.join("Semis_2021_0001_0001_LA93_IGN69.las"), b"garbage").unwrap();

        let dirs = WorkDirs::new(&input, dir.path().join("tmp"), dir.path().join("out"));
        let report = run_batch(&dirs, &PipelineConfig::default()).unwrap();
        assert_eq!(report.tiles.len(), 2);
        assert_eq!(report.succeeded(), 0);
        assert_eq!(report.failed().count(), 2);
    }
}
