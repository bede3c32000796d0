//! Box-counting fractal dimension and turn-direction entropy of a path.

const EPSILON: f64 = 1e-10;
const SCALE_COUNT: usize = 10;
const MIN_LOG_SCALE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FractalEntropy {
    pub dimension: f64,
    pub entropy: f64,
}

impl FractalEntropy {
    /// Reported for paths too short or too compact to measure.
    pub const DEGENERATE: FractalEntropy = FractalEntropy { dimension: 1.0, entropy: 0.0 };
}

/// `n` values evenly spaced in log10 between `10^start` and `10^stop`.
fn log_space(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let step = if n > 1 { (stop - start) / (n - 1) as f64 } else { 0.0 };
    (0..n).map(|i| 10f64.powf(start + step * i as f64)).collect()
}

/// Edges `min, min+scale, ...` up to and including the first edge at or
/// past `max`.
fn bin_edges(min: f64, max: f64, scale: f64) -> Vec<f64> {
    let n = ((max + scale - min) / scale).ceil().max(0.0) as usize;
    (0..n).map(|i| min + i as f64 * scale).collect()
}

/// Bin of `v` among `edges`, the last bin closed on the right.
fn bin_of(v: f64, edges: &[f64]) -> Option<usize> {
    let last = edges.len().checked_sub(1)?;
    if last == 0 || v < edges[0] || v > edges[last] {
        return None;
    }
    if v == edges[last] {
        return Some(last - 1);
    }
    // first edge strictly greater than v
    let upper = edges.partition_point(|&e| e <= v);
    Some(upper - 1)
}

/// Number of occupied `scale`-sized boxes over the points' bounding box.
pub fn box_count(points: &[(f64, f64)], min: (f64, f64), max: (f64, f64), scale: f64) -> usize {
    let xe = bin_edges(min.0, max.0, scale);
    let ye = bin_edges(min.1, max.1, scale);
    let mut boxes: Vec<(usize, usize)> = points
        .iter()
        .filter_map(|&(x, y)| Some((bin_of(x, &xe)?, bin_of(y, &ye)?)))
        .collect();
    boxes.sort_unstable();
    boxes.dedup();
    boxes.len()
}

fn least_squares_slope(xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len() as f64;
    let mx = xs.iter().sum::<f64>() / n;
    let my = ys.iter().sum::<f64>() / n;
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx) * (x - mx);
    }
    sxy / sxx
}

/// Angles (degrees) between consecutive displacement vectors. A zero-length
/// step yields 90°.
pub fn heading_changes(points: &[(f64, f64)]) -> Vec<f64> {
    let steps: Vec<(f64, f64)> = points.windows(2).map(|w| (w[1].0 - w[0].0, w[1].1 - w[0].1)).collect();
    steps
        .windows(2)
        .map(|w| {
            let (a, b) = (w[0], w[1]);
            let dot = a.0 * b.0 + a.1 * b.1;
            let mag = a.0.hypot(a.1) * b.0.hypot(b.1);
            (dot / (mag + EPSILON)).clamp(-1.0, 1.0).acos().to_degrees()
        })
        .collect()
}

/// Shannon entropy (bits) of the sharp (>= 90°) / smooth split.
pub fn turn_entropy(angles: &[f64]) -> f64 {
    if angles.is_empty() {
        return 0.0;
    }
    let p1 = angles.iter().filter(|&&a| a >= 90.0).count() as f64 / angles.len() as f64;
    let p2 = 1.0 - p1;
    let mut h = 0.0;
    for p in [p1, p2] {
        if p > 0.0 {
            h -= p * p.log2();
        }
    }
    h
}

pub fn fractal_entropy(points: &[(f64, f64)]) -> FractalEntropy {
    if points.len() < 3 {
        return FractalEntropy::DEGENERATE;
    }

    let mut min = (f64::INFINITY, f64::INFINITY);
    let mut max = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for &(x, y) in points {
        min = (min.0.min(x), min.1.min(y));
        max = (max.0.max(x), max.1.max(y));
    }
    let size = (max.0 - min.0).max(max.1 - min.1).max(0.0);
    if !(size >= 1e-6) {
        return FractalEntropy::DEGENERATE;
    }

    let half = size / 2.0;
    let stop = if half > 0.0 { half.log10() } else { 0.0 };

    let mut log_scales = Vec::with_capacity(SCALE_COUNT);
    let mut log_counts = Vec::with_capacity(SCALE_COUNT);
    for scale in log_space(MIN_LOG_SCALE, stop, SCALE_COUNT) {
        if scale < 1e-6 {
            continue;
        }
        let count = box_count(points, min, max, scale);
        if count > 0 {
            log_scales.push(scale.ln());
            log_counts.push((count as f64).ln());
        }
    }
    if log_counts.len() < 2 {
        return FractalEntropy::DEGENERATE;
    }

    let slope = least_squares_slope(&log_scales, &log_counts);
    let dimension = if slope.is_nan() { 1.0 } else { -slope };
    let entropy = turn_entropy(&heading_changes(points));

    FractalEntropy {
        dimension,
        entropy: if entropy.is_nan() { 0.0 } else { entropy },
    }
}
