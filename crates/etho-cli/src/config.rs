use anyhow::{Context, Result};
use serde::Deserialize;

use etho_endpoints::AnalysisConfig;
use etho_grid::{CellAssigner, GridSpec, GridTransform, VideoSize};
use etho_vision::tracker::TrackingConfig;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub video: VideoCfg,
    pub grid: GridCfg,
    #[serde(default)]
    pub filter: FilterCfg,
    #[serde(default)]
    pub tracking: TrackingCfg,
    #[serde(default)]
    pub analysis: AnalysisConfig,
}

#[derive(Debug, Deserialize)]
pub struct VideoCfg {
    pub width: u32,
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: f64,
}

#[derive(Debug, Deserialize)]
pub struct GridCfg {
    pub cols: u32,
    pub rows: u32,
    #[serde(default)]
    pub transform: GridTransform,
}

#[derive(Debug, Deserialize)]
pub struct FilterCfg {
    #[serde(default = "default_max_per_cell")]
    pub max_animals_per_cell: usize,
}

#[derive(Debug, Deserialize)]
pub struct TrackingCfg {
    #[serde(default = "default_sample_rate")]
    pub frame_sample_rate: u64,
    #[serde(default = "default_time_gap")]
    pub time_gap_seconds: f64,
    /// Of one cell width.
    #[serde(default = "default_distance_fraction")]
    pub max_distance_fraction: f64,
}

fn default_fps() -> f64 { 30.0 }
fn default_max_per_cell() -> usize { 1 }
fn default_sample_rate() -> u64 { 1 }
fn default_time_gap() -> f64 { 1.0 }
fn default_distance_fraction() -> f64 { 0.3 }

impl Default for FilterCfg {
    fn default() -> Self {
        Self { max_animals_per_cell: default_max_per_cell() }
    }
}

impl Default for TrackingCfg {
    fn default() -> Self {
        Self {
            frame_sample_rate: default_sample_rate(),
            time_gap_seconds: default_time_gap(),
            max_distance_fraction: default_distance_fraction(),
        }
    }
}

impl Config {
    pub fn video_size(&self) -> VideoSize {
        VideoSize { width: self.video.width, height: self.video.height }
    }

    pub fn grid_spec(&self) -> GridSpec {
        GridSpec { cols: self.grid.cols, rows: self.grid.rows }
    }

    pub fn assigner(&self) -> Result<CellAssigner> {
        Ok(CellAssigner::new(self.grid_spec(), &self.grid.transform, self.video_size())?)
    }

    pub fn tracking_config(&self) -> Result<TrackingConfig> {
        Ok(TrackingConfig::for_grid(
            self.video.width,
            self.grid.cols,
            self.tracking.max_distance_fraction,
            self.tracking.time_gap_seconds,
            self.video.fps,
        )?)
    }
}

pub fn load_config(path: &str) -> Result<Config> {
    let s = std::fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    toml::from_str(&s).context("parse config toml")
}
