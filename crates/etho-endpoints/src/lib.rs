//! Movement endpoints for per-cell trajectories: distance, speed, activity
//! and zone shares, turning, box-counting fractal dimension and turn entropy,
//! rolled up into per-file and cross-file tables.

pub mod analyzer;
pub mod doctor;
pub mod fractal;
pub mod params;
pub mod report;

pub use analyzer::{EndpointValue, EndpointsAnalyzer};
pub use fractal::{fractal_entropy, FractalEntropy};
pub use params::{AnalysisConfig, AnalysisMode, AnalysisParams, CellOverride, Endpoint, SideViewAxis, SideViewParams};
pub use report::{analyze_file, grand_average, report_rows, report_stem, CellResult, FileResult};
