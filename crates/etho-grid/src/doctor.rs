use anyhow::Result;

use crate::cells::{GridSpec, VideoSize};
use crate::transform::GridTransform;

pub fn check_grid(grid: &GridSpec, transform: &GridTransform, video: &VideoSize) -> Result<()> {
    anyhow::ensure!(grid.cols >= 1 && grid.rows >= 1, "grid.cols and grid.rows must be >= 1");
    anyhow::ensure!(
        grid.cols.checked_mul(grid.rows).is_some(),
        "grid.cols x grid.rows overflows the cell id range"
    );
    anyhow::ensure!(video.width > 0 && video.height > 0, "video.width/height must be > 0");
    anyhow::ensure!(
        (0.0..=1.0).contains(&transform.center_x) && (0.0..=1.0).contains(&transform.center_y),
        "grid.transform.center_x/center_y should be normalised to 0..1"
    );
    anyhow::ensure!(transform.angle.is_finite(), "grid.transform.angle must be finite");
    anyhow::ensure!(
        transform.scale_x > 0.0 && transform.scale_y > 0.0,
        "grid.transform.scale_x/scale_y must be > 0"
    );
    anyhow::ensure!(transform.inverse_matrix(*video).is_some(), "grid transform is not invertible");
    Ok(())
}

pub fn check_fps(fps: f64) -> Result<()> {
    anyhow::ensure!(fps.is_finite() && fps > 0.0, "video.fps must be > 0");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_default_layout() {
        let grid = GridSpec { cols: 4, rows: 3 };
        let video = VideoSize { width: 1920, height: 1080 };
        check_grid(&grid, &GridTransform::default(), &video).unwrap();
        check_fps(30.0).unwrap();
    }

    #[test]
    fn rejects_bad_scale_and_centre() {
        let grid = GridSpec { cols: 1, rows: 1 };
        let video = VideoSize { width: 640, height: 480 };
        let t = GridTransform { scale_y: -1.0, ..Default::default() };
        assert!(check_grid(&grid, &t, &video).is_err());
        let t = GridTransform { center_x: 1.5, ..Default::default() };
        assert!(check_grid(&grid, &t, &video).is_err());
        assert!(check_fps(0.0).is_err());
    }

    #[test]
    fn rejects_grid_too_large_to_number() {
        let video = VideoSize { width: 640, height: 480 };
        let grid = GridSpec { cols: u32::MAX, rows: 2 };
        let err = check_grid(&grid, &GridTransform::default(), &video).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }
}
