//! Raw detection records as they arrive from the detector feed.
//!
//! Numeric fields are loosely typed upstream: a value may be a JSON number, a
//! numeric string, an empty string or null. Normalisation turns every record
//! into a [`Detection`] and reports what it had to patch.

use serde::{Deserialize, Serialize};
use tracing::warn;

use etho_proto::{Detection, EthoError};

use crate::{group_by_frame, FrameMap};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNumber {
    Num(f64),
    Text(String),
}

impl RawNumber {
    fn parse(&self) -> Option<f64> {
        let v = match self {
            RawNumber::Num(v) => *v,
            RawNumber::Text(s) => s.trim().parse::<f64>().ok()?,
        };
        v.is_finite().then_some(v)
    }

    fn is_blank(&self) -> bool {
        matches!(self, RawNumber::Text(s) if s.trim().is_empty())
    }

    fn describe(&self) -> String {
        match self {
            RawNumber::Num(v) => v.to_string(),
            RawNumber::Text(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    pub frame_idx: Option<RawNumber>,
    #[serde(default)]
    pub x1: Option<RawNumber>,
    #[serde(default)]
    pub y1: Option<RawNumber>,
    #[serde(default)]
    pub x2: Option<RawNumber>,
    #[serde(default)]
    pub y2: Option<RawNumber>,
    #[serde(default)]
    pub cx: Option<RawNumber>,
    #[serde(default)]
    pub cy: Option<RawNumber>,
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub conf: Option<RawNumber>,
}

/// Outcome of normalising a whole feed.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub frames: FrameMap<Detection>,
    /// Fields that were present but could not be parsed.
    pub warnings: Vec<EthoError>,
    /// Records dropped because their frame index was unusable.
    pub dropped: usize,
}

fn field(
    raw: &Option<RawNumber>,
    frame: u64,
    name: &'static str,
    warnings: &mut Vec<EthoError>,
) -> Option<f64> {
    let raw = raw.as_ref()?;
    if raw.is_blank() {
        return None;
    }
    let parsed = raw.parse();
    if parsed.is_none() {
        warnings.push(EthoError::malformed(frame, name, raw.describe()));
    }
    parsed
}

fn frame_index(raw: &Option<RawNumber>) -> Option<u64> {
    let v = raw.as_ref()?.parse()?;
    (v >= 0.0 && v.fract() == 0.0).then_some(v as u64)
}

impl RawDetection {
    /// Missing or unparseable coordinates become `None`, confidence falls back
    /// to `0.0`. Returns `Err` only when the frame index itself is unusable.
    pub fn normalize(&self, warnings: &mut Vec<EthoError>) -> Result<Detection, EthoError> {
        let frame = frame_index(&self.frame_idx).ok_or_else(|| {
            EthoError::malformed(
                0,
                "frame_idx",
                self.frame_idx.as_ref().map(RawNumber::describe).unwrap_or_default(),
            )
        })?;

        let mut det = Detection {
            frame_idx: frame,
            x1: field(&self.x1, frame, "x1", warnings),
            y1: field(&self.y1, frame, "y1", warnings),
            x2: field(&self.x2, frame, "x2", warnings),
            y2: field(&self.y2, frame, "y2", warnings),
            cx: field(&self.cx, frame, "cx", warnings),
            cy: field(&self.cy, frame, "cy", warnings),
            class_name: self.class_name.clone().unwrap_or_default(),
            conf: field(&self.conf, frame, "conf", warnings).unwrap_or(0.0),
            cell_id: None,
        };
        // a partial box is no box
        if det.x1.is_none() || det.y1.is_none() || det.x2.is_none() || det.y2.is_none() {
            det.x1 = None;
            det.y1 = None;
            det.x2 = None;
            det.y2 = None;
        }
        det.fill_centroid();
        Ok(det)
    }
}

/// Normalise a feed into a sparse frame map, logging every patched field.
pub fn normalize_feed(raw: &[RawDetection]) -> Normalized {
    let mut warnings = Vec::new();
    let mut dropped = 0usize;
    let mut dets = Vec::with_capacity(raw.len());

    for r in raw {
        match r.normalize(&mut warnings) {
            Ok(d) => dets.push(d),
            Err(e) => {
                warn!("dropping detection: {}", e);
                dropped += 1;
            }
        }
    }
    for w in &warnings {
        warn!("{}", w);
    }

    Normalized { frames: group_by_frame(dets), warnings, dropped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<RawDetection> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn accepts_numbers_strings_blanks_and_nulls() {
        let raw = parse(
            r#"[
                {"frame_idx": 3, "x1": "10", "y1": 20, "x2": "30.5", "y2": 40, "class_name": "swim", "conf": "0.75"},
                {"frame_idx": "3", "cx": "", "cy": null, "class_name": "freeze", "conf": ""}
            ]"#,
        );
        let out = normalize_feed(&raw);
        assert!(out.warnings.is_empty());
        assert_eq!(out.dropped, 0);

        let frame = &out.frames[&3];
        assert_eq!(frame.len(), 2);
        assert_eq!(frame[0].x1, Some(10.0));
        assert_eq!(frame[0].centroid(), Some((20.25, 30.0)));
        assert_eq!(frame[0].conf, 0.75);
        assert_eq!(frame[1].centroid(), None);
        assert_eq!(frame[1].conf, 0.0);
    }

    #[test]
    fn garbage_numbers_become_warnings() {
        let raw = parse(r#"[{"frame_idx": 1, "cx": "abc", "cy": 5, "conf": "high"}]"#);
        let out = normalize_feed(&raw);
        let d = &out.frames[&1][0];
        assert_eq!(d.cx, None);
        assert_eq!(d.cy, Some(5.0));
        assert_eq!(d.conf, 0.0);
        assert_eq!(out.warnings.len(), 2);
        assert_eq!(out.warnings[0], EthoError::malformed(1, "cx", "abc"));
        assert!(out.warnings.iter().all(EthoError::is_recoverable));
    }

    #[test]
    fn unusable_frame_index_drops_record() {
        let raw = parse(r#"[{"frame_idx": "x"}, {"frame_idx": -1}, {"frame_idx": 2.5}, {"frame_idx": 4, "class_name": "ok"}]"#);
        let out = normalize_feed(&raw);
        assert_eq!(out.dropped, 3);
        assert_eq!(out.frames.keys().copied().collect::<Vec<_>>(), vec![4]);
    }

    #[test]
    fn explicit_centroid_wins_over_box() {
        let raw = parse(r#"[{"frame_idx": 0, "x1": 0, "y1": 0, "x2": 10, "y2": 10, "cx": 1, "cy": 2}]"#);
        let out = normalize_feed(&raw);
        assert_eq!(out.frames[&0][0].centroid(), Some((1.0, 2.0)));
    }

    #[test]
    fn partial_box_is_discarded() {
        let raw = parse(r#"[{"frame_idx": 0, "x1": 0, "y1": 0, "x2": 10}]"#);
        let d = &normalize_feed(&raw).frames[&0][0];
        assert_eq!(d.x1, None);
        assert_eq!(d.centroid(), None);
    }
}
