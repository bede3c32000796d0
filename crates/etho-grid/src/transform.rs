use serde::{Deserialize, Serialize};

use crate::cells::VideoSize;

// Determinants at or below this are treated as singular.
const SINGULAR_EPS: f64 = 1e-12;

/// Row-major 2x3 affine map:
/// x' = a*x + b*y + tx
/// y' = c*x + d*y + ty
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine2 {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Affine2 {
    pub const IDENTITY: Affine2 = Affine2 { a: 1.0, b: 0.0, c: 0.0, d: 1.0, tx: 0.0, ty: 0.0 };

    pub fn translation(tx: f64, ty: f64) -> Self {
        Self { tx, ty, ..Self::IDENTITY }
    }

    pub fn scaling(sx: f64, sy: f64) -> Self {
        Self { a: sx, d: sy, ..Self::IDENTITY }
    }

    /// Rotation by `degrees` (clockwise on screen, y axis pointing down).
    pub fn rotation(degrees: f64) -> Self {
        let (sin, cos) = exact_sin_cos(degrees);
        Self { a: cos, b: -sin, c: sin, d: cos, tx: 0.0, ty: 0.0 }
    }

    /// `self ∘ inner`: apply `inner` first, then `self`.
    pub fn compose(&self, inner: &Affine2) -> Affine2 {
        Affine2 {
            a: self.a * inner.a + self.b * inner.c,
            b: self.a * inner.b + self.b * inner.d,
            c: self.c * inner.a + self.d * inner.c,
            d: self.c * inner.b + self.d * inner.d,
            tx: self.a * inner.tx + self.b * inner.ty + self.tx,
            ty: self.c * inner.tx + self.d * inner.ty + self.ty,
        }
    }

    pub fn map(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.b * y + self.tx, self.c * x + self.d * y + self.ty)
    }

    pub fn determinant(&self) -> f64 {
        self.a * self.d - self.b * self.c
    }

    /// `None` when the linear part is singular (or not finite).
    pub fn inverse(&self) -> Option<Affine2> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() <= SINGULAR_EPS {
            return None;
        }
        let a = self.d / det;
        let b = -self.b / det;
        let c = -self.c / det;
        let d = self.a / det;
        Some(Affine2 {
            a,
            b,
            c,
            d,
            tx: -(a * self.tx + b * self.ty),
            ty: -(c * self.tx + d * self.ty),
        })
    }
}

/// User-facing grid placement. `center_*` are normalised to the video size,
/// `angle` is in degrees, scales are unitless.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    #[serde(default = "half")]
    pub center_x: f64,
    #[serde(default = "half")]
    pub center_y: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "one")]
    pub scale_x: f64,
    #[serde(default = "one")]
    pub scale_y: f64,
}

fn half() -> f64 { 0.5 }
fn one() -> f64 { 1.0 }

impl Default for GridTransform {
    fn default() -> Self {
        Self { center_x: 0.5, center_y: 0.5, angle: 0.0, scale_x: 1.0, scale_y: 1.0 }
    }
}

impl GridTransform {
    /// Canonical grid space -> video pixel space:
    /// translate to centre, rotate, scale, translate back by half the frame.
    pub fn matrix(&self, video: VideoSize) -> Affine2 {
        let (w, h) = (video.width as f64, video.height as f64);
        Affine2::translation(self.center_x * w, self.center_y * h)
            .compose(&Affine2::rotation(self.wrapped_angle()))
            .compose(&Affine2::scaling(self.scale_x, self.scale_y))
            .compose(&Affine2::translation(-w / 2.0, -h / 2.0))
    }

    /// Video pixel space -> canonical grid space, `None` if degenerate.
    pub fn inverse_matrix(&self, video: VideoSize) -> Option<Affine2> {
        self.matrix(video).inverse()
    }

    pub fn wrapped_angle(&self) -> f64 {
        wrap_degrees(self.angle)
    }

    /// Apply a mouse-drag rotation around the grid centre. Positions are
    /// normalised to the video size.
    pub fn rotate_by_drag(&mut self, video: VideoSize, last: (f64, f64), current: (f64, f64)) {
        if video.width == 0 {
            return;
        }
        let (w, h) = (video.width as f64, video.height as f64);
        let (cx, cy) = (self.center_x * w, self.center_y * h);
        let prev = (last.1 * h - cy).atan2(last.0 * w - cx);
        let curr = (current.1 * h - cy).atan2(current.0 * w - cx);
        self.angle = wrap_degrees(self.angle + (curr - prev).to_degrees());
    }
}

/// Wrap into (-180, 180].
pub fn wrap_degrees(deg: f64) -> f64 {
    let r = deg.rem_euclid(360.0);
    if r > 180.0 { r - 360.0 } else { r }
}

// Quarter turns are exact so axis-aligned grids map pixel edges without drift.
fn exact_sin_cos(degrees: f64) -> (f64, f64) {
    let deg = wrap_degrees(degrees);
    if deg == 0.0 {
        (0.0, 1.0)
    } else if deg == 90.0 {
        (1.0, 0.0)
    } else if deg == 180.0 {
        (0.0, -1.0)
    } else if deg == -90.0 {
        (-1.0, 0.0)
    } else {
        deg.to_radians().sin_cos()
    }
}
