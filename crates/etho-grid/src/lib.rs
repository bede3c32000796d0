pub mod cells;
pub mod doctor;
pub mod transform;

pub use cells::{cell_for_point, cell_geometry, CellAssigner, CellGeometry, GridSpec, VideoSize};
pub use transform::{Affine2, GridTransform};
