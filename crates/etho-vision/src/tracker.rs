use std::collections::BTreeMap;

use etho_proto::{Detection, EthoError, Result, TrackPath, TrackedPoint};

use crate::{sample_every, FrameMap};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackingConfig {
    /// Matches must be strictly closer than this (pixels).
    pub max_distance: f64,
    /// A track is dropped from matching once `frame - last_frame` exceeds this.
    pub forget_frames: u64,
}

impl TrackingConfig {
    /// `max_distance` as a fraction of one cell width, `forget_frames` from a
    /// time gap in seconds.
    pub fn for_grid(
        video_width: u32,
        cols: u32,
        distance_fraction: f64,
        time_gap_seconds: f64,
        fps: f64,
    ) -> Result<Self> {
        if cols == 0 {
            return Err(EthoError::configuration("grid.cols must be >= 1 for tracking"));
        }
        if fps.is_nan() || fps <= 0.0 {
            return Err(EthoError::configuration(format!("cannot track with fps={}", fps)));
        }
        Ok(Self {
            max_distance: (video_width as f64 / cols as f64) * distance_fraction,
            forget_frames: (time_gap_seconds.max(0.0) * fps).floor() as u64,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveTrack {
    x: f64,
    y: f64,
    last_frame: u64,
}

/// Greedy nearest-neighbour identity assignment.
///
/// Live tracks go in ascending id order. Each looks up its closest point in
/// the frame and takes it if it is within `max_distance` and no earlier track
/// took it first; otherwise the track stays unmatched this frame. This is not
/// an optimal assignment: an earlier track can take a point a later track was
/// closer to, and the later track does not fall back to its second choice.
#[derive(Debug, Clone)]
pub struct Tracker {
    cfg: TrackingConfig,
    next_id: u64,
    active: BTreeMap<u64, ActiveTrack>,
}

impl Tracker {
    pub fn new(cfg: TrackingConfig) -> Self {
        Self { cfg, next_id: 0, active: BTreeMap::new() }
    }

    pub fn active_ids(&self) -> Vec<u64> {
        self.active.keys().copied().collect()
    }

    /// Assign ids to one frame's points. Frames must arrive in ascending order;
    /// an empty frame leaves the state untouched.
    pub fn update(&mut self, frame: u64, points: &[(f64, f64)]) -> Vec<TrackedPoint> {
        if points.is_empty() {
            return Vec::new();
        }

        let forget = self.cfg.forget_frames;
        self.active.retain(|_, t| frame.saturating_sub(t.last_frame) <= forget);

        let mut ids: Vec<Option<u64>> = vec![None; points.len()];

        if !self.active.is_empty() {
            // rows: live tracks in id order, cols: current points
            let dist: Vec<(u64, Vec<f64>)> = self
                .active
                .iter()
                .map(|(&id, t)| (id, points.iter().map(|&(x, y)| (x - t.x).hypot(y - t.y)).collect()))
                .collect();

            let mut claimed = 0usize;
            for (id, row) in dist {
                if claimed == points.len() {
                    break;
                }
                let mut best: Option<(usize, f64)> = None;
                for (j, &d) in row.iter().enumerate() {
                    if best.map_or(true, |(_, bd)| d < bd) {
                        best = Some((j, d));
                    }
                }
                if let Some((j, d)) = best {
                    if d < self.cfg.max_distance && ids[j].is_none() {
                        ids[j] = Some(id);
                        claimed += 1;
                        let (x, y) = points[j];
                        self.active.insert(id, ActiveTrack { x, y, last_frame: frame });
                    }
                }
            }
        }

        // unmatched points open new tracks
        points
            .iter()
            .zip(ids)
            .map(|(&(x, y), id)| {
                let id = id.unwrap_or_else(|| {
                    let id = self.next_id;
                    self.next_id += 1;
                    self.active.insert(id, ActiveTrack { x, y, last_frame: frame });
                    id
                });
                TrackedPoint { frame_idx: frame, x, y, id }
            })
            .collect()
    }

    /// Run over a whole sparse frame map in ascending frame order.
    pub fn track(&mut self, points_by_frame: &FrameMap<(f64, f64)>) -> FrameMap<TrackedPoint> {
        points_by_frame
            .iter()
            .filter(|(_, pts)| !pts.is_empty())
            .map(|(&frame, pts)| (frame, self.update(frame, pts)))
            .collect()
    }
}

/// Centroids of sampled detections (every `sample_rate`-th frame); detections
/// without a centroid are skipped.
pub fn sampled_points(detections: &FrameMap<Detection>, sample_rate: u64) -> FrameMap<(f64, f64)> {
    sample_every(detections, sample_rate)
        .into_iter()
        .map(|(f, dets)| (f, dets.iter().filter_map(Detection::centroid).collect::<Vec<_>>()))
        .filter(|(_, pts)| !pts.is_empty())
        .collect()
}

/// Group tracked points into per-id paths, ids ascending, points by frame.
pub fn paths(tracked: &FrameMap<TrackedPoint>) -> Vec<TrackPath> {
    let mut by_id: BTreeMap<u64, Vec<(u64, f64, f64)>> = BTreeMap::new();
    for pts in tracked.values() {
        for p in pts {
            by_id.entry(p.id).or_default().push((p.frame_idx, p.x, p.y));
        }
    }
    by_id.into_iter().map(|(id, points)| TrackPath { id, points }).collect()
}
