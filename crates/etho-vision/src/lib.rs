mod topk;
pub mod doctor;
pub mod export;
pub mod feed;
pub mod timeline;
pub mod tracker;

use std::collections::BTreeMap;

use etho_grid::CellAssigner;
use etho_proto::{CellId, Detection, TimelineSegment};
use tracing::debug;

pub use topk::filter_top_k;

/// Sparse frame-indexed mapping, iterated in ascending frame order.
pub type FrameMap<T> = BTreeMap<u64, Vec<T>>;

pub type Timeline = BTreeMap<CellId, Vec<TimelineSegment>>;

#[derive(Debug, Clone, Default)]
pub struct Processed {
    /// Cell-stamped detections, at most K per (frame, cell).
    pub detections: FrameMap<Detection>,
    pub timeline: Timeline,
}

impl Processed {
    pub fn detection_count(&self) -> usize {
        self.detections.values().map(Vec::len).sum()
    }

    /// Ordered `(frame, cx, cy)` samples per cell, for endpoint analysis.
    pub fn samples_by_cell(&self) -> BTreeMap<CellId, Vec<(u64, f64, f64)>> {
        let mut out: BTreeMap<CellId, Vec<(u64, f64, f64)>> = BTreeMap::new();
        for dets in self.detections.values() {
            for d in dets {
                if let (Some(cell), Some((cx, cy))) = (d.cell_id, d.centroid()) {
                    out.entry(cell).or_default().push((d.frame_idx, cx, cy));
                }
            }
        }
        out
    }
}

pub fn group_by_frame(dets: impl IntoIterator<Item = Detection>) -> FrameMap<Detection> {
    let mut out = FrameMap::new();
    for d in dets {
        out.entry(d.frame_idx).or_insert_with(Vec::new).push(d);
    }
    out
}

/// Returns the detections with `cx/cy` filled and `cell_id` set. Detections
/// without a usable centroid stay unassigned.
pub fn stamp_cells(frames: FrameMap<Detection>, assigner: &CellAssigner) -> FrameMap<Detection> {
    frames
        .into_iter()
        .map(|(frame, dets)| {
            let stamped = dets
                .into_iter()
                .map(|mut d| {
                    d.fill_centroid();
                    d.cell_id = d.centroid().and_then(|(x, y)| assigner.assign(x, y));
                    d
                })
                .collect();
            (frame, stamped)
        })
        .collect()
}

/// Cell assignment, per-cell top-K and timeline in one pass over a video's detections.
pub fn process(frames: FrameMap<Detection>, assigner: &CellAssigner, max_per_cell: usize) -> Processed {
    let stamped = stamp_cells(frames, assigner);
    let unassigned = stamped.values().flatten().filter(|d| d.cell_id.is_none()).count();
    let detections = filter_top_k(stamped, max_per_cell);
    let timeline = timeline::build_timeline(&detections);

    let out = Processed { detections, timeline };
    debug!(
        kept = out.detection_count(),
        unassigned,
        cells = out.timeline.len(),
        "processed detections"
    );
    out
}

/// Keep frames whose index is a multiple of `rate`.
pub fn sample_every<T: Clone>(frames: &FrameMap<T>, rate: u64) -> FrameMap<T> {
    let rate = rate.max(1);
    frames
        .iter()
        .filter(|(f, _)| *f % rate == 0)
        .map(|(f, v)| (*f, v.clone()))
        .collect()
}
