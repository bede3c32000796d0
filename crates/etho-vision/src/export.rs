use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use etho_grid::GridSpec;
use etho_proto::{CellId, Detection};

use crate::{sample_every, FrameMap};

/// One frame of the centroid wide table: slot `i` holds cell `i + 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidRow {
    pub frame_idx: u64,
    pub cells: Vec<Option<(f64, f64)>>,
}

/// Dense per-frame table spanning the first to the last frame that carries
/// a cell-stamped detection. Frames in between without detections get a row
/// of empty slots.
pub fn centroid_table(frames: &FrameMap<Detection>, grid: GridSpec) -> Vec<CentroidRow> {
    let n = grid.cell_count() as usize;
    let mut by_frame: BTreeMap<u64, Vec<Option<(f64, f64)>>> = BTreeMap::new();

    for (&frame, dets) in frames {
        for d in dets {
            let Some(cell) = d.cell_id else { continue };
            let slot = cell as usize;
            if slot == 0 || slot > n {
                continue;
            }
            let row = by_frame.entry(frame).or_insert_with(|| vec![None; n]);
            row[slot - 1] = d.centroid();
        }
    }

    let (Some(&first), Some(&last)) = (by_frame.keys().next(), by_frame.keys().next_back()) else {
        return Vec::new();
    };
    (first..=last)
        .map(|frame_idx| CentroidRow {
            frame_idx,
            cells: by_frame.remove(&frame_idx).unwrap_or_else(|| vec![None; n]),
        })
        .collect()
}

/// Frame gap within which consecutive samples of one cell still count as
/// one continuous visit.
pub fn gap_threshold(time_gap_seconds: f64, fps: f64) -> u64 {
    if fps > 0.0 {
        (time_gap_seconds.max(0.0) * fps).floor() as u64
    } else {
        1
    }
}

/// Points to accumulate into a heat map, cell by cell.
///
/// After sub-sampling, each cell keeps its first point plus every point whose
/// frame distance to the previous sample is at most `gap_frames`.
pub fn heatmap_points(
    frames: &FrameMap<Detection>,
    sample_rate: u64,
    gap_frames: u64,
) -> BTreeMap<CellId, Vec<(f64, f64)>> {
    let mut by_cell: BTreeMap<CellId, Vec<(u64, f64, f64)>> = BTreeMap::new();
    for dets in sample_every(frames, sample_rate).values() {
        for d in dets {
            if let (Some(cell), Some((x, y))) = (d.cell_id, d.centroid()) {
                by_cell.entry(cell).or_default().push((d.frame_idx, x, y));
            }
        }
    }

    by_cell
        .into_iter()
        .map(|(cell, mut samples)| {
            samples.sort_by_key(|s| s.0);
            let mut kept = Vec::with_capacity(samples.len());
            if let Some(&(_, x, y)) = samples.first() {
                kept.push((x, y));
            }
            for w in samples.windows(2) {
                if w[1].0 - w[0].0 <= gap_frames {
                    kept.push((w[1].1, w[1].2));
                }
            }
            (cell, kept)
        })
        .collect()
}
