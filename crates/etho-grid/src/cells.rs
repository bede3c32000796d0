use etho_proto::{CellId, EthoError, Result};
use serde::{Deserialize, Serialize};

use crate::transform::{Affine2, GridTransform};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(EthoError::configuration(format!(
                "video size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        Ok(())
    }
}

/// `cols x rows` cells, numbered 1-based row-major from the top-left of the
/// canonical grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSpec {
    pub cols: u32,
    pub rows: u32,
}

impl GridSpec {
    pub fn new(cols: u32, rows: u32) -> Result<Self> {
        let g = Self { cols, rows };
        g.validate()?;
        Ok(g)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cols == 0 || self.rows == 0 {
            return Err(EthoError::configuration(format!(
                "grid must have at least one column and one row, got {}x{}",
                self.cols, self.rows
            )));
        }
        if self.cols.checked_mul(self.rows).is_none() {
            return Err(EthoError::configuration(format!(
                "grid of {}x{} cells does not fit in a 32-bit cell id",
                self.cols, self.rows
            )));
        }
        Ok(())
    }

    /// Saturates for a grid that `validate` would reject.
    pub fn cell_count(&self) -> u32 {
        self.cols.saturating_mul(self.rows)
    }

    pub fn cell_id(&self, row: u32, col: u32) -> CellId {
        row * self.cols + col + 1
    }

    /// Inverse of `cell_id`; `None` outside `1..=cell_count`.
    pub fn row_col(&self, cell: CellId) -> Option<(u32, u32)> {
        if cell == 0 || cell > self.cell_count() {
            return None;
        }
        let idx = cell - 1;
        Some((idx / self.cols, idx % self.cols))
    }
}

/// Cell containing a pixel point, given the pixel -> canonical map.
///
/// Returns `None` when the point lands outside the canonical frame. The
/// clamp only absorbs floating-point values sitting exactly on the far edge.
pub fn cell_for_point(
    x: f64,
    y: f64,
    video: VideoSize,
    grid: GridSpec,
    inverse: &Affine2,
) -> Option<CellId> {
    let (w, h) = (video.width as f64, video.height as f64);
    let (tx, ty) = inverse.map(x, y);
    if !(0.0..w).contains(&tx) || !(0.0..h).contains(&ty) {
        return None;
    }
    let cell_w = w / grid.cols as f64;
    let cell_h = h / grid.rows as f64;
    let col = ((tx / cell_w).floor() as i64).clamp(0, grid.cols as i64 - 1) as u32;
    let row = ((ty / cell_h).floor() as i64).clamp(0, grid.rows as i64 - 1) as u32;
    Some(grid.cell_id(row, col))
}

/// Grid + inverse transform resolved once per video.
#[derive(Debug, Clone, Copy)]
pub struct CellAssigner {
    grid: GridSpec,
    video: VideoSize,
    inverse: Affine2,
}

impl CellAssigner {
    pub fn new(grid: GridSpec, transform: &GridTransform, video: VideoSize) -> Result<Self> {
        grid.validate()?;
        video.validate()?;
        let inverse = transform.inverse_matrix(video).ok_or_else(|| {
            EthoError::configuration(format!(
                "grid transform is not invertible (scale_x={}, scale_y={})",
                transform.scale_x, transform.scale_y
            ))
        })?;
        Ok(Self { grid, video, inverse })
    }

    pub fn grid(&self) -> GridSpec {
        self.grid
    }

    pub fn video(&self) -> VideoSize {
        self.video
    }

    pub fn assign(&self, x: f64, y: f64) -> Option<CellId> {
        cell_for_point(x, y, self.video, self.grid, &self.inverse)
    }

    /// Canonical-space position of a pixel point.
    pub fn to_canonical(&self, x: f64, y: f64) -> (f64, f64) {
        self.inverse.map(x, y)
    }
}

/// Pixel-space placement of one cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellGeometry {
    pub id: CellId,
    pub center: (f64, f64),
    /// top-left, top-right, bottom-right, bottom-left of the canonical cell
    pub corners: [(f64, f64); 4],
}

pub fn cell_geometry(grid: GridSpec, transform: &GridTransform, video: VideoSize) -> Result<Vec<CellGeometry>> {
    grid.validate()?;
    video.validate()?;
    let m = transform.matrix(video);
    let cw = video.width as f64 / grid.cols as f64;
    let ch = video.height as f64 / grid.rows as f64;

    let mut out = Vec::with_capacity(grid.cell_count() as usize);
    for r in 0..grid.rows {
        for c in 0..grid.cols {
            let (x0, y0) = (c as f64 * cw, r as f64 * ch);
            let (x1, y1) = ((c + 1) as f64 * cw, (r + 1) as f64 * ch);
            out.push(CellGeometry {
                id: grid.cell_id(r, c),
                center: m.map(x0 + cw / 2.0, y0 + ch / 2.0),
                corners: [m.map(x0, y0), m.map(x1, y0), m.map(x1, y1), m.map(x0, y1)],
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VIDEO: VideoSize = VideoSize { width: 100, height: 100 };

    fn assigner(cols: u32, rows: u32, t: GridTransform) -> CellAssigner {
        CellAssigner::new(GridSpec::new(cols, rows).unwrap(), &t, VIDEO).unwrap()
    }

    #[test]
    fn oversized_grid_is_rejected() {
        assert!(GridSpec::new(u32::MAX, 2).is_err());
        assert!(GridSpec::new(65_536, 65_536).is_err());
        assert_eq!(GridSpec::new(65_535, 65_537).unwrap().cell_count(), u32::MAX);
        let g = GridSpec { cols: u32::MAX, rows: 2 };
        assert_eq!(g.cell_count(), u32::MAX);
    }

    #[test]
    fn two_by_one_scenario() {
        let a = assigner(2, 1, GridTransform::default());
        assert_eq!(a.assign(10.0, 10.0), Some(1));
        assert_eq!(a.assign(90.0, 10.0), Some(2));
        assert_eq!(a.assign(10.0, 110.0), None);
    }

    #[test]
    fn far_edge_is_outside_near_edge_inside() {
        let a = assigner(2, 2, GridTransform::default());
        assert_eq!(a.assign(0.0, 0.0), Some(1));
        assert_eq!(a.assign(100.0, 50.0), None);
        assert_eq!(a.assign(99.999, 99.999), Some(4));
        assert_eq!(a.assign(-0.001, 10.0), None);
    }

    #[test]
    fn non_finite_points_are_unassigned() {
        let a = assigner(3, 3, GridTransform::default());
        assert_eq!(a.assign(f64::NAN, 10.0), None);
        assert_eq!(a.assign(10.0, f64::INFINITY), None);
    }

    #[test]
    fn rotated_grid_swaps_cells() {
        // half turn: the left half of the video holds the right canonical cell
        let a = assigner(2, 1, GridTransform { angle: 180.0, ..Default::default() });
        assert_eq!(a.assign(10.0, 50.0), Some(2));
        assert_eq!(a.assign(90.0, 50.0), Some(1));
    }

    #[test]
    fn shrunken_grid_leaves_margin_unassigned() {
        let a = assigner(1, 1, GridTransform { scale_x: 0.5, scale_y: 0.5, ..Default::default() });
        assert_eq!(a.assign(50.0, 50.0), Some(1));
        assert_eq!(a.assign(10.0, 10.0), None);
        assert_eq!(a.assign(74.0, 74.0), Some(1));
    }

    #[test]
    fn repeated_assignment_is_deterministic() {
        let a = assigner(4, 3, GridTransform { angle: 12.5, scale_x: 0.9, ..Default::default() });
        for i in 0..50 {
            let (x, y) = (i as f64 * 2.0, 100.0 - i as f64 * 1.7);
            assert_eq!(a.assign(x, y), a.assign(x, y));
        }
    }

    #[test]
    fn every_in_bounds_point_lands_in_one_valid_cell() {
        let a = assigner(5, 4, GridTransform { angle: 30.0, scale_x: 0.7, scale_y: 0.8, center_x: 0.45, ..Default::default() });
        for yi in 0..100 {
            for xi in 0..100 {
                let (x, y) = (xi as f64 + 0.5, yi as f64 + 0.5);
                let (tx, ty) = a.to_canonical(x, y);
                let inside = (0.0..100.0).contains(&tx) && (0.0..100.0).contains(&ty);
                match a.assign(x, y) {
                    Some(c) => {
                        assert!(inside);
                        assert!((1..=20).contains(&c));
                    }
                    None => assert!(!inside),
                }
            }
        }
    }

    #[test]
    fn degenerate_transform_is_a_configuration_error() {
        let grid = GridSpec::new(2, 2).unwrap();
        let t = GridTransform { scale_x: 0.0, ..Default::default() };
        let err = CellAssigner::new(grid, &t, VIDEO).unwrap_err();
        assert!(matches!(err, EthoError::Configuration { .. }));
    }

    #[test]
    fn zero_sized_grid_or_video_is_rejected() {
        assert!(GridSpec::new(0, 3).is_err());
        let grid = GridSpec { cols: 2, rows: 2 };
        let err = CellAssigner::new(grid, &GridTransform::default(), VideoSize { width: 0, height: 10 });
        assert!(err.is_err());
    }

    #[test]
    fn row_col_inverts_cell_id() {
        let g = GridSpec::new(3, 2).unwrap();
        assert_eq!(g.cell_id(1, 2), 6);
        assert_eq!(g.row_col(6), Some((1, 2)));
        assert_eq!(g.row_col(1), Some((0, 0)));
        assert_eq!(g.row_col(0), None);
        assert_eq!(g.row_col(7), None);
    }

    #[test]
    fn geometry_of_identity_grid() {
        let cells = cell_geometry(GridSpec::new(2, 1).unwrap(), &GridTransform::default(), VIDEO).unwrap();
        assert_eq!(cells.len(), 2);
        assert_eq!(cells[1].id, 2);
        assert_eq!(cells[1].center, (75.0, 50.0));
        assert_eq!(cells[1].corners, [(50.0, 0.0), (100.0, 0.0), (100.0, 100.0), (50.0, 100.0)]);
    }
}
