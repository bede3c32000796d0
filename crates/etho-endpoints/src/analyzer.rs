use std::collections::BTreeMap;

use etho_proto::{EthoError, Result};

use crate::fractal::fractal_entropy;
use crate::params::{AnalysisMode, AnalysisParams, Endpoint, SideViewAxis, SideViewParams};

const EPSILON: f64 = 1e-10;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EndpointValue {
    Real(f64),
    Count(u64),
}

impl EndpointValue {
    pub fn as_f64(self) -> f64 {
        match self {
            EndpointValue::Real(v) => v,
            EndpointValue::Count(n) => n as f64,
        }
    }

    /// Reals to 4 decimals with NaN shown as zero; counts as integers.
    pub fn formatted(self) -> String {
        match self {
            EndpointValue::Real(v) => format!("{:.4}", if v.is_nan() { 0.0 } else { v }),
            EndpointValue::Count(n) => n.to_string(),
        }
    }
}

/// Change of heading at `b` when moving `a -> b -> c`, degrees in [0, 180]:
/// 0 for straight ahead, 180 for a reversal. Zero if either step has no
/// length.
///
/// This is the supplement of the interior angle at `b` (180 for a straight
/// path), so turn totals and meandering are not comparable with tools that
/// report interior angles.
pub fn turning_angle(a: (f64, f64), b: (f64, f64), c: (f64, f64)) -> f64 {
    let v1 = (b.0 - a.0, b.1 - a.1);
    let v2 = (c.0 - b.0, c.1 - b.1);
    let mag = v1.0.hypot(v1.1) * v2.0.hypot(v2.1);
    if mag == 0.0 {
        return 0.0;
    }
    ((v1.0 * v2.0 + v1.1 * v2.1) / mag).clamp(-1.0, 1.0).acos().to_degrees()
}

fn mean(xs: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = xs.len();
    if n == 0 {
        return 0.0;
    }
    xs.sum::<f64>() / n as f64
}

fn percent(part: f64, total: f64) -> f64 {
    if total > 0.0 {
        part / total * 100.0
    } else {
        0.0
    }
}

/// Movement endpoints for one cell's ordered samples.
#[derive(Debug, Clone)]
pub struct EndpointsAnalyzer {
    params: AnalysisParams,
}

struct Steps {
    /// cm
    distances: Vec<f64>,
    /// s
    intervals: Vec<f64>,
    /// cm/s, 0 for zero-length intervals
    speeds: Vec<f64>,
}

impl EndpointsAnalyzer {
    pub fn new(params: AnalysisParams) -> Result<Self> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &AnalysisParams {
        &self.params
    }

    fn steps(&self, samples: &[(u64, f64, f64)]) -> Steps {
        let p = &self.params;
        let mut steps = Steps { distances: Vec::new(), intervals: Vec::new(), speeds: Vec::new() };
        for w in samples.windows(2) {
            let d = (w[1].1 - w[0].1).hypot(w[1].2 - w[0].2) / p.conversion_rate;
            let dt = w[1].0.saturating_sub(w[0].0) as f64 / p.frame_rate;
            steps.distances.push(d);
            steps.intervals.push(dt);
            steps.speeds.push(if dt != 0.0 { d / dt } else { 0.0 });
        }
        steps
    }

    /// Every endpoint that applies to the configured mode, unformatted.
    ///
    /// Samples are sorted by frame first. An empty sample list is the only
    /// error; short lists degrade to zeros.
    pub fn compute(&self, samples: &[(u64, f64, f64)]) -> Result<BTreeMap<Endpoint, EndpointValue>> {
        if samples.is_empty() {
            return Err(EthoError::insufficient(None, 1, 0));
        }
        let mut samples = samples.to_vec();
        samples.sort_by_key(|s| s.0);

        let p = &self.params;
        let points: Vec<(f64, f64)> = samples.iter().map(|s| (s.1, s.2)).collect();
        let steps = self.steps(&samples);
        let mut out = BTreeMap::new();

        let total_distance: f64 = steps.distances.iter().sum();
        out.insert(Endpoint::TotalDistance, EndpointValue::Real(total_distance));
        out.insert(Endpoint::AverageSpeed, EndpointValue::Real(mean(steps.speeds.iter().copied())));
        out.insert(
            Endpoint::AverageDistanceFromCenter,
            EndpointValue::Real(
                mean(points.iter().map(|&(x, y)| (x - p.center.0).hypot(y - p.center.1))) / p.conversion_rate,
            ),
        );

        match (p.mode, &p.side_view) {
            (AnalysisMode::SideView, Some(sv)) => self.side_view(sv, &samples, &steps, &mut out),
            (AnalysisMode::SideView, None) => {
                return Err(EthoError::configuration("side view analysis needs cell corners"));
            }
            (AnalysisMode::TopView, _) => self.top_view(&points, total_distance, &mut out),
        }

        let fe = fractal_entropy(&points);
        out.insert(Endpoint::FractalDimension, EndpointValue::Real(fe.dimension));
        out.insert(Endpoint::Entropy, EndpointValue::Real(fe.entropy));
        Ok(out)
    }

    /// The selected endpoints in selection order, NaN replaced by zero.
    /// Endpoints the mode does not produce are left out.
    pub fn analyze(&self, samples: &[(u64, f64, f64)]) -> Result<Vec<(Endpoint, EndpointValue)>> {
        let all = self.compute(samples)?;
        Ok(self
            .params
            .selected
            .iter()
            .filter_map(|e| {
                let v = match *all.get(e)? {
                    EndpointValue::Real(v) if v.is_nan() => EndpointValue::Real(0.0),
                    v => v,
                };
                Some((*e, v))
            })
            .collect())
    }

    fn side_view(
        &self,
        sv: &SideViewParams,
        samples: &[(u64, f64, f64)],
        steps: &Steps,
        out: &mut BTreeMap<Endpoint, EndpointValue>,
    ) {
        let fps = self.params.frame_rate;
        let total = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) if samples.len() > 1 => (last.0 - first.0) as f64 / fps,
            _ => 0.0,
        };

        let mut rapid = 0.0;
        let mut swimming = 0.0;
        for (&speed, &dt) in steps.speeds.iter().zip(&steps.intervals) {
            if speed > sv.rapid_threshold {
                rapid += dt;
            } else if speed > sv.freezing_threshold {
                swimming += dt;
            }
        }
        // freezing takes whatever duration is left
        let freezing = total - rapid - swimming;
        out.insert(Endpoint::RapidTime, EndpointValue::Real(percent(rapid, total)));
        out.insert(Endpoint::SwimmingTime, EndpointValue::Real(percent(swimming, total)));
        out.insert(Endpoint::FreezingTime, EndpointValue::Real(percent(freezing, total).max(0.0)));

        let (start, end) = axis_line(sv.axis, &sv.corners);
        let z1 = sv.zone1_percent / 100.0;
        let z2 = sv.zone2_percent / 100.0;
        let in_top: Vec<bool> = samples
            .iter()
            .map(|s| zone_progress((s.1, s.2), start, end) <= z1)
            .collect();
        let in_bottom: Vec<bool> = samples
            .iter()
            .map(|s| zone_progress((s.1, s.2), start, end) >= 1.0 - z2)
            .collect();

        let top = in_top.iter().filter(|&&t| t).count();
        let bottom = in_bottom.iter().filter(|&&b| b).count();
        let middle = in_top.iter().zip(&in_bottom).filter(|(t, b)| !**t && !**b).count();
        out.insert(Endpoint::TimeInTop, EndpointValue::Real(percent(top as f64 / fps, total)));
        out.insert(Endpoint::TimeInMiddle, EndpointValue::Real(percent(middle as f64 / fps, total)));
        out.insert(Endpoint::TimeInBottom, EndpointValue::Real(percent(bottom as f64 / fps, total)));

        let entries = in_top.windows(2).filter(|w| !w[0] && w[1]).count() as u64;
        out.insert(Endpoint::EntriesToTop, EndpointValue::Count(entries));
    }

    fn top_view(&self, points: &[(f64, f64)], total_distance: f64, out: &mut BTreeMap<Endpoint, EndpointValue>) {
        let angles: Vec<f64> = points.windows(3).map(|w| turning_angle(w[0], w[1], w[2]).abs()).collect();
        let total_turn: f64 = angles.iter().sum();

        out.insert(Endpoint::TotalAbsoluteTurnAngle, EndpointValue::Real(total_turn));
        out.insert(
            Endpoint::AverageAngularVelocity,
            EndpointValue::Real(mean(angles.iter().copied()) * self.params.frame_rate),
        );
        // degrees per metre with distances in cm
        let meandering = if total_distance > 0.0 { total_turn / (total_distance / 100.0) } else { 0.0 };
        out.insert(Endpoint::Meandering, EndpointValue::Real(meandering));
    }
}

/// Start and end of the zone axis for a cell quadrilateral given as
/// top-left, top-right, bottom-right, bottom-left.
pub fn axis_line(axis: SideViewAxis, corners: &[(f64, f64); 4]) -> ((f64, f64), (f64, f64)) {
    let [p1, p2, p3, p4] = *corners;
    let mid = |a: (f64, f64), b: (f64, f64)| ((a.0 + b.0) / 2.0, (a.1 + b.1) / 2.0);
    match axis {
        SideViewAxis::TopBottom => (mid(p1, p2), mid(p4, p3)),
        SideViewAxis::LeftTopToRightBottom => (p1, p3),
        SideViewAxis::LeftBottomToRightTop => (p4, p2),
    }
}

/// Scalar projection of `p` onto `start -> end`, clamped to [0, 1]. A
/// degenerate axis puts every point halfway.
pub fn zone_progress(p: (f64, f64), start: (f64, f64), end: (f64, f64)) -> f64 {
    let line = (end.0 - start.0, end.1 - start.1);
    let mag_sq = line.0 * line.0 + line.1 * line.1;
    if mag_sq < EPSILON {
        return 0.5;
    }
    let v = (p.0 - start.0, p.1 - start.1);
    ((v.0 * line.0 + v.1 * line.1) / mag_sq).clamp(0.0, 1.0)
}
