use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use etho_endpoints::FileResult;
use etho_grid::cell_geometry;
use etho_proto::{CellId, Detection, TrackPath};
use etho_vision::feed::{normalize_feed, RawDetection};
use etho_vision::{export, process, tracker, Processed};

use crate::batch::file_name;
use crate::config::Config;

/// JSON envelope for every file written.
#[derive(Debug, Serialize)]
pub struct Document<'a, T: Serialize> {
    pub generated_unix_ms: i64,
    pub source: &'a str,
    pub data: &'a T,
}

pub fn now_unix_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn write_json<T: Serialize>(out_dir: &Path, name: &str, source: &str, data: &T) -> Result<PathBuf> {
    let path = out_dir.join(name);
    let doc = Document { generated_unix_ms: now_unix_ms(), source, data };
    let s = serde_json::to_string_pretty(&doc).context("serialize output")?;
    std::fs::write(&path, s).with_context(|| format!("write {}", path.display()))?;
    debug!("wrote {}", path.display());
    Ok(path)
}

fn stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "detections".to_string())
}

/// Read a JSON detection feed and run assignment, top-K and timeline.
pub fn load_and_process(cfg: &Config, path: &Path) -> Result<Processed> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read feed {}", path.display()))?;
    let raw: Vec<RawDetection> =
        serde_json::from_str(&s).with_context(|| format!("parse feed {}", path.display()))?;
    let normalized = normalize_feed(&raw);
    if !normalized.warnings.is_empty() || normalized.dropped > 0 {
        info!(
            warnings = normalized.warnings.len(),
            dropped = normalized.dropped,
            "{}: patched malformed records",
            file_name(path)
        );
    }

    let assigner = cfg.assigner().with_context(|| file_name(path))?;
    Ok(process(normalized.frames, &assigner, cfg.filter.max_animals_per_cell))
}

pub fn process_file(cfg: &Config, path: &Path, out_dir: &Path) -> Result<usize> {
    let processed = load_and_process(cfg, path)?;
    let src = file_name(path);
    let stem = stem(path);

    let detections: Vec<&Detection> = processed.detections.values().flatten().collect();
    write_json(out_dir, &format!("{}_detections.json", stem), &src, &detections)?;
    write_json(out_dir, &format!("{}_timeline.json", stem), &src, &processed.timeline)?;

    let table = export::centroid_table(&processed.detections, cfg.grid_spec());
    write_json(out_dir, &format!("{}_centroids.json", stem), &src, &table)?;

    let gap = export::gap_threshold(cfg.tracking.time_gap_seconds, cfg.video.fps);
    let heat: BTreeMap<CellId, Vec<(f64, f64)>> =
        export::heatmap_points(&processed.detections, cfg.tracking.frame_sample_rate, gap);
    write_json(out_dir, &format!("{}_heatmap.json", stem), &src, &heat)?;

    Ok(processed.detection_count())
}

pub fn track_file(cfg: &Config, path: &Path, out_dir: &Path) -> Result<Vec<TrackPath>> {
    let processed = load_and_process(cfg, path)?;
    let tcfg = cfg.tracking_config().with_context(|| file_name(path))?;

    let points = tracker::sampled_points(&processed.detections, cfg.tracking.frame_sample_rate);
    let tracked = tracker::Tracker::new(tcfg).track(&points);
    let paths = tracker::paths(&tracked);
    debug!(tracks = paths.len(), max_distance = tcfg.max_distance, forget_frames = tcfg.forget_frames, "tracked");

    write_json(out_dir, &format!("{}_tracks.json", stem(path)), &file_name(path), &paths)?;
    Ok(paths)
}

pub fn analyze_file(cfg: &Config, path: &Path) -> Result<FileResult> {
    let processed = load_and_process(cfg, path)?;
    let geometry = cell_geometry(cfg.grid_spec(), &cfg.grid.transform, cfg.video_size())?;
    let samples = processed.samples_by_cell();
    Ok(etho_endpoints::analyze_file(&file_name(path), &samples, &cfg.analysis, &geometry)?)
}
