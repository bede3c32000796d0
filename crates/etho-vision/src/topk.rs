use std::collections::BTreeMap;

use etho_proto::{CellId, Detection};

use crate::FrameMap;

/// Keep the `k` most confident detections per (frame, cell).
///
/// Unassigned detections are dropped. Ties keep input order (stable sort),
/// kept detections are emitted in ascending cell order and frames left empty
/// are omitted.
pub fn filter_top_k(frames: FrameMap<Detection>, k: usize) -> FrameMap<Detection> {
    let mut out = FrameMap::new();
    for (frame, dets) in frames {
        let mut by_cell: BTreeMap<CellId, Vec<Detection>> = BTreeMap::new();
        for d in dets {
            if let Some(cell) = d.cell_id {
                by_cell.entry(cell).or_default().push(d);
            }
        }

        let mut kept = Vec::new();
        for (_, mut in_cell) in by_cell {
            in_cell.sort_by(|a, b| b.conf.partial_cmp(&a.conf).unwrap_or(std::cmp::Ordering::Equal));
            in_cell.truncate(k);
            kept.extend(in_cell);
        }
        if !kept.is_empty() {
            out.insert(frame, kept);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::det;

    #[test]
    fn keeps_most_confident_in_cell() {
        let frames = FrameMap::from([(5, vec![det(5, Some(3), 0.4, "a"), det(5, Some(3), 0.9, "b")])]);
        let out = filter_top_k(frames, 1);
        assert_eq!(out[&5].len(), 1);
        assert_eq!(out[&5][0].conf, 0.9);
        assert_eq!(out[&5][0].class_name, "b");
    }

    #[test]
    fn ties_keep_input_order() {
        let frames = FrameMap::from([(
            0,
            vec![det(0, Some(1), 0.5, "first"), det(0, Some(1), 0.5, "second"), det(0, Some(1), 0.5, "third")],
        )]);
        let out = filter_top_k(frames, 2);
        let labels: Vec<&str> = out[&0].iter().map(|d| d.class_name.as_str()).collect();
        assert_eq!(labels, vec!["first", "second"]);
    }

    #[test]
    fn unassigned_are_dropped_and_empty_frames_omitted() {
        let frames = FrameMap::from([
            (0, vec![det(0, None, 0.99, "x")]),
            (1, vec![det(1, None, 0.2, "x"), det(1, Some(2), 0.1, "y")]),
        ]);
        let out = filter_top_k(frames, 3);
        assert!(!out.contains_key(&0));
        assert_eq!(out[&1].len(), 1);
        assert_eq!(out[&1][0].cell_id, Some(2));
    }

    #[test]
    fn kept_never_exceed_k_and_dominate_discarded() {
        let confs = [0.3, 0.8, 0.1, 0.8, 0.55, 0.9, 0.2, 0.65];
        let mut dets = Vec::new();
        for (i, c) in confs.iter().enumerate() {
            dets.push(det(7, Some((i % 3) as u32 + 1), *c, "z"));
        }
        for k in 1..4 {
            let out = filter_top_k(FrameMap::from([(7, dets.clone())]), k);
            for cell in 1..=3 {
                let kept: Vec<f64> = out[&7].iter().filter(|d| d.cell_id == Some(cell)).map(|d| d.conf).collect();
                assert!(kept.len() <= k);
                let min_kept = kept.iter().cloned().fold(f64::INFINITY, f64::min);

                let mut input: Vec<f64> = dets.iter().filter(|d| d.cell_id == Some(cell)).map(|d| d.conf).collect();
                input.sort_by(|a, b| b.partial_cmp(a).unwrap());
                assert_eq!(kept.len(), input.len().min(k));
                for discarded in input.iter().skip(kept.len()) {
                    assert!(*discarded <= min_kept);
                }
            }
        }
    }

    #[test]
    fn cells_are_emitted_in_ascending_order() {
        let frames = FrameMap::from([(0, vec![det(0, Some(4), 0.1, "d"), det(0, Some(2), 0.1, "b")])]);
        let out = filter_top_k(frames, 1);
        let cells: Vec<_> = out[&0].iter().map(|d| d.cell_id).collect();
        assert_eq!(cells, vec![Some(2), Some(4)]);
    }
}
