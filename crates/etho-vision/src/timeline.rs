use std::collections::BTreeMap;

use etho_proto::{CellId, Detection, TimelineSegment};

use crate::{FrameMap, Timeline};

/// Per-cell behaviour timeline from filtered, cell-stamped detections.
///
/// Cells that never hold a detection get no entry. If a cell has several
/// detections in one frame the last one wins.
pub fn build_timeline(frames: &FrameMap<Detection>) -> Timeline {
    let mut labels: BTreeMap<CellId, BTreeMap<u64, &str>> = BTreeMap::new();
    for (frame, dets) in frames {
        for d in dets {
            if let Some(cell) = d.cell_id {
                labels.entry(cell).or_default().insert(*frame, d.class_name.as_str());
            }
        }
    }

    labels
        .into_iter()
        .filter(|(_, by_frame)| !by_frame.is_empty())
        .map(|(cell, by_frame)| (cell, run_length(&by_frame)))
        .collect()
}

/// Run-length encode an ordered frame -> label map. A label change or a
/// frame gap always starts a new segment.
pub fn run_length<S: AsRef<str>>(by_frame: &BTreeMap<u64, S>) -> Vec<TimelineSegment> {
    let mut out = Vec::new();
    let mut current: Option<(u64, u64, &str)> = None;

    for (&frame, label) in by_frame {
        let label = label.as_ref();
        current = match current {
            Some((start, prev, cur)) if cur == label && frame == prev + 1 => Some((start, frame, cur)),
            Some((start, prev, cur)) => {
                out.push(TimelineSegment { start_frame: start, end_frame: prev, label: cur.to_string() });
                Some((frame, frame, label))
            }
            None => Some((frame, frame, label)),
        };
    }
    if let Some((start, end, label)) = current {
        out.push(TimelineSegment { start_frame: start, end_frame: end, label: label.to_string() });
    }
    out
}

/// Label active at `frame`, if any segment covers it.
pub fn label_at(segments: &[TimelineSegment], frame: u64) -> Option<&str> {
    let idx = segments.partition_point(|s| s.end_frame < frame);
    segments
        .get(idx)
        .filter(|s| s.contains(frame))
        .map(|s| s.label.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::det;

    fn seg(s: u64, e: u64, l: &str) -> TimelineSegment {
        TimelineSegment { start_frame: s, end_frame: e, label: l.into() }
    }

    #[test]
    fn frame_gap_splits_same_label() {
        let frames = FrameMap::from([
            (10, vec![det(10, Some(1), 0.9, "swim")]),
            (11, vec![det(11, Some(1), 0.9, "swim")]),
            (12, vec![det(12, Some(1), 0.9, "swim")]),
            (15, vec![det(15, Some(1), 0.9, "swim")]),
        ]);
        let tl = build_timeline(&frames);
        assert_eq!(tl[&1], vec![seg(10, 12, "swim"), seg(15, 15, "swim")]);
    }

    #[test]
    fn label_change_splits_contiguous_frames() {
        let by_frame = BTreeMap::from([(0, "swim"), (1, "swim"), (2, "freeze"), (3, "swim")]);
        assert_eq!(
            run_length(&by_frame),
            vec![seg(0, 1, "swim"), seg(2, 2, "freeze"), seg(3, 3, "swim")]
        );
    }

    #[test]
    fn unoccupied_cells_have_no_entry() {
        let frames = FrameMap::from([(0, vec![det(0, Some(2), 0.5, "a"), det(0, None, 0.5, "b")])]);
        let tl = build_timeline(&frames);
        assert_eq!(tl.keys().copied().collect::<Vec<_>>(), vec![2]);
        assert!(run_length::<&str>(&BTreeMap::new()).is_empty());
    }

    #[test]
    fn last_detection_in_frame_wins() {
        let frames = FrameMap::from([(4, vec![det(4, Some(1), 0.9, "first"), det(4, Some(1), 0.8, "second")])]);
        assert_eq!(build_timeline(&frames)[&1], vec![seg(4, 4, "second")]);
    }

    #[test]
    fn segments_cover_exactly_the_occupied_frames() {
        let frames_in: Vec<(u64, &str)> = vec![
            (0, "a"), (1, "a"), (2, "b"), (3, "b"), (7, "b"), (8, "a"), (9, "a"), (20, "a"), (21, "c"),
        ];
        let by_frame: BTreeMap<u64, &str> = frames_in.iter().cloned().collect();
        let segs = run_length(&by_frame);

        let mut covered = Vec::new();
        for s in &segs {
            assert!(s.start_frame <= s.end_frame);
            for f in s.start_frame..=s.end_frame {
                assert_eq!(by_frame[&f], s.label);
                covered.push(f);
            }
        }
        assert_eq!(covered, by_frame.keys().copied().collect::<Vec<_>>());

        for w in segs.windows(2) {
            assert!(w[0].end_frame < w[1].start_frame);
            // adjacent segments must differ in label or be separated by a gap
            assert!(w[0].label != w[1].label || w[1].start_frame > w[0].end_frame + 1);
        }
    }

    #[test]
    fn label_lookup() {
        let segs = vec![seg(0, 4, "a"), seg(7, 9, "b")];
        assert_eq!(label_at(&segs, 0), Some("a"));
        assert_eq!(label_at(&segs, 5), None);
        assert_eq!(label_at(&segs, 9), Some("b"));
        assert_eq!(label_at(&segs, 10), None);
    }
}
