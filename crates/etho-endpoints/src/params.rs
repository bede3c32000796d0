use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use etho_grid::CellGeometry;
use etho_proto::{CellId, EthoError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    #[default]
    SideView,
    TopView,
}

/// Line along which SideView samples are projected to find their zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideViewAxis {
    /// Midpoint of the top edge to midpoint of the bottom edge.
    #[default]
    TopBottom,
    LeftTopToRightBottom,
    LeftBottomToRightTop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Endpoint {
    TotalDistance,
    AverageSpeed,
    AverageDistanceFromCenter,
    FreezingTime,
    SwimmingTime,
    RapidTime,
    TimeInTop,
    TimeInMiddle,
    TimeInBottom,
    EntriesToTop,
    TotalAbsoluteTurnAngle,
    /// Turn angle per second. Turns are heading changes (0 when going
    /// straight), not interior angles.
    AverageAngularVelocity,
    /// Degrees of heading change per metre travelled. Uses the same heading
    /// change as `TotalAbsoluteTurnAngle`, so a straight path scores 0 where
    /// an interior-angle convention would give 180 per vertex.
    Meandering,
    FractalDimension,
    Entropy,
}

impl Endpoint {
    pub const ALL: [Endpoint; 15] = [
        Endpoint::TotalDistance,
        Endpoint::AverageSpeed,
        Endpoint::AverageDistanceFromCenter,
        Endpoint::FreezingTime,
        Endpoint::SwimmingTime,
        Endpoint::RapidTime,
        Endpoint::TimeInTop,
        Endpoint::TimeInMiddle,
        Endpoint::TimeInBottom,
        Endpoint::EntriesToTop,
        Endpoint::TotalAbsoluteTurnAngle,
        Endpoint::AverageAngularVelocity,
        Endpoint::Meandering,
        Endpoint::FractalDimension,
        Endpoint::Entropy,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Endpoint::TotalDistance => "Total Distance (cm)",
            Endpoint::AverageSpeed => "Average Speed (cm/s)",
            Endpoint::AverageDistanceFromCenter => "Average Distance from Center (cm)",
            Endpoint::FreezingTime => "Freezing Time (%)",
            Endpoint::SwimmingTime => "Swimming Time (%)",
            Endpoint::RapidTime => "Rapid Time (%)",
            Endpoint::TimeInTop => "Time in Top (%)",
            Endpoint::TimeInMiddle => "Time in Middle (%)",
            Endpoint::TimeInBottom => "Time in Bottom (%)",
            Endpoint::EntriesToTop => "Entries to Top",
            Endpoint::TotalAbsoluteTurnAngle => "Total Absolute Turn Angle (degree)",
            Endpoint::AverageAngularVelocity => "Average Angular Velocity (degree/s)",
            Endpoint::Meandering => "Meandering (degree/m)",
            Endpoint::FractalDimension => "Fractal Dimension",
            Endpoint::Entropy => "Entropy",
        }
    }

    /// The only mode this endpoint is computed in, `None` for both.
    pub const fn mode(self) -> Option<AnalysisMode> {
        match self {
            Endpoint::FreezingTime
            | Endpoint::SwimmingTime
            | Endpoint::RapidTime
            | Endpoint::TimeInTop
            | Endpoint::TimeInMiddle
            | Endpoint::TimeInBottom
            | Endpoint::EntriesToTop => Some(AnalysisMode::SideView),
            Endpoint::TotalAbsoluteTurnAngle | Endpoint::AverageAngularVelocity | Endpoint::Meandering => {
                Some(AnalysisMode::TopView)
            }
            _ => None,
        }
    }

    pub fn available_in(self, mode: AnalysisMode) -> bool {
        self.mode().map_or(true, |m| m == mode)
    }

    /// Endpoints reported when nothing is selected explicitly.
    pub fn defaults_for(mode: AnalysisMode) -> Vec<Endpoint> {
        Endpoint::ALL
            .into_iter()
            .filter(|e| e.available_in(mode))
            .filter(|e| !matches!(e, Endpoint::TotalDistance | Endpoint::TotalAbsoluteTurnAngle))
            .collect()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Endpoint {
    type Err = EthoError;

    fn from_str(s: &str) -> Result<Self> {
        Endpoint::ALL
            .into_iter()
            .find(|e| e.name() == s)
            .ok_or_else(|| EthoError::configuration(format!("unknown endpoint {:?}", s)))
    }
}

impl Serialize for Endpoint {
    fn serialize<S: Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Endpoint {
    fn deserialize<D: Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(d)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SideViewParams {
    /// Speeds above this are rapid (cm/s).
    pub rapid_threshold: f64,
    /// Speeds at or below this are freezing (cm/s).
    pub freezing_threshold: f64,
    pub axis: SideViewAxis,
    pub zone1_percent: f64,
    pub zone2_percent: f64,
    /// top-left, top-right, bottom-right, bottom-left
    pub corners: [(f64, f64); 4],
}

/// Everything the analyzer needs for one cell.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisParams {
    pub mode: AnalysisMode,
    /// Pixels per centimetre.
    pub conversion_rate: f64,
    pub frame_rate: f64,
    /// Reference point for "Average Distance from Center", in pixels.
    pub center: (f64, f64),
    pub side_view: Option<SideViewParams>,
    pub selected: Vec<Endpoint>,
}

impl AnalysisParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.conversion_rate.is_finite() && self.conversion_rate > 0.0) {
            return Err(EthoError::configuration(format!(
                "conversion_rate must be > 0, got {}",
                self.conversion_rate
            )));
        }
        if !(self.frame_rate.is_finite() && self.frame_rate > 0.0) {
            return Err(EthoError::configuration(format!("frame_rate must be > 0, got {}", self.frame_rate)));
        }
        match (&self.side_view, self.mode) {
            (None, AnalysisMode::SideView) => {
                Err(EthoError::configuration("side view analysis needs cell corners and zone settings"))
            }
            (Some(sv), _) => {
                for (name, v) in [("zone1_percent", sv.zone1_percent), ("zone2_percent", sv.zone2_percent)] {
                    if !(0.0..=100.0).contains(&v) {
                        return Err(EthoError::configuration(format!("{} must be within 0..=100, got {}", name, v)));
                    }
                }
                Ok(())
            }
            (None, AnalysisMode::TopView) => Ok(()),
        }
    }
}

/// Per-cell adjustments under `[analysis.cells.<id>]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CellOverride {
    #[serde(default)]
    pub center_dx: f64,
    #[serde(default)]
    pub center_dy: f64,
    #[serde(default)]
    pub zone1_percent: Option<f64>,
    #[serde(default)]
    pub zone2_percent: Option<f64>,
}

fn default_conversion_rate() -> f64 { 100.0 }
fn default_frame_rate() -> f64 { 30.0 }
fn default_rapid_threshold() -> f64 { 5.0 }
fn default_freezing_threshold() -> f64 { 0.5 }
fn default_zone_percent() -> f64 { 33.0 }

/// The `[analysis]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub mode: AnalysisMode,
    #[serde(default = "default_conversion_rate")]
    pub conversion_rate: f64,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    #[serde(default = "default_rapid_threshold")]
    pub rapid_threshold: f64,
    #[serde(default = "default_freezing_threshold")]
    pub freezing_threshold: f64,
    #[serde(default)]
    pub side_view_axis: SideViewAxis,
    #[serde(default = "default_zone_percent")]
    pub zone1_percent: f64,
    #[serde(default = "default_zone_percent")]
    pub zone2_percent: f64,
    /// Empty means the default set for `mode`.
    #[serde(default)]
    pub selected_endpoints: Vec<Endpoint>,
    /// Keyed by cell id as a string, TOML table keys being strings.
    #[serde(default)]
    pub cells: BTreeMap<String, CellOverride>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            mode: AnalysisMode::default(),
            conversion_rate: default_conversion_rate(),
            frame_rate: default_frame_rate(),
            rapid_threshold: default_rapid_threshold(),
            freezing_threshold: default_freezing_threshold(),
            side_view_axis: SideViewAxis::default(),
            zone1_percent: default_zone_percent(),
            zone2_percent: default_zone_percent(),
            selected_endpoints: Vec::new(),
            cells: BTreeMap::new(),
        }
    }
}

impl AnalysisConfig {
    pub fn selected(&self) -> Vec<Endpoint> {
        if self.selected_endpoints.is_empty() {
            Endpoint::defaults_for(self.mode)
        } else {
            self.selected_endpoints.clone()
        }
    }

    pub fn override_for(&self, cell: CellId) -> Option<&CellOverride> {
        self.cells.get(&cell.to_string())
    }

    /// Cell ids named under `[analysis.cells]` that do not parse.
    pub fn bad_cell_keys(&self) -> Vec<&str> {
        self.cells
            .keys()
            .filter(|k| k.parse::<CellId>().map_or(true, |id| id == 0))
            .map(String::as_str)
            .collect()
    }

    /// Parameters for one cell: its geometric centre shifted by any
    /// configured offset, its corners, and its zone split.
    pub fn params_for(&self, geom: &CellGeometry) -> AnalysisParams {
        let ov = self.override_for(geom.id).cloned().unwrap_or_default();
        let side_view = match self.mode {
            AnalysisMode::SideView => Some(SideViewParams {
                rapid_threshold: self.rapid_threshold,
                freezing_threshold: self.freezing_threshold,
                axis: self.side_view_axis,
                zone1_percent: ov.zone1_percent.unwrap_or(self.zone1_percent),
                zone2_percent: ov.zone2_percent.unwrap_or(self.zone2_percent),
                corners: geom.corners,
            }),
            AnalysisMode::TopView => None,
        };
        AnalysisParams {
            mode: self.mode,
            conversion_rate: self.conversion_rate,
            frame_rate: self.frame_rate,
            center: (geom.center.0 + ov.center_dx, geom.center.1 + ov.center_dy),
            side_view,
            selected: self.selected(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for e in Endpoint::ALL {
            assert_eq!(e.name().parse::<Endpoint>().unwrap(), e);
        }
        assert!("Speed".parse::<Endpoint>().is_err());
    }

    #[test]
    fn default_selection_per_mode() {
        let side = Endpoint::defaults_for(AnalysisMode::SideView);
        assert_eq!(side.len(), 11);
        assert!(side.contains(&Endpoint::EntriesToTop));
        assert!(!side.contains(&Endpoint::Meandering));

        let top = Endpoint::defaults_for(AnalysisMode::TopView);
        assert_eq!(
            top,
            vec![
                Endpoint::AverageSpeed,
                Endpoint::AverageDistanceFromCenter,
                Endpoint::AverageAngularVelocity,
                Endpoint::Meandering,
                Endpoint::FractalDimension,
                Endpoint::Entropy,
            ]
        );
    }

    #[test]
    fn config_parses_with_overrides() {
        let cfg: AnalysisConfig = toml::from_str(
            r#"
            mode = "side_view"
            conversion_rate = 10.0
            side_view_axis = "left_top_to_right_bottom"
            selected_endpoints = ["Time in Top (%)", "Entries to Top"]

            [cells.2]
            center_dx = 5.0
            zone1_percent = 50.0
            "#,
        )
        .unwrap();
        assert_eq!(cfg.frame_rate, 30.0);
        assert_eq!(cfg.selected(), vec![Endpoint::TimeInTop, Endpoint::EntriesToTop]);

        let geom = CellGeometry {
            id: 2,
            center: (50.0, 50.0),
            corners: [(0.0, 0.0), (100.0, 0.0), (100.0, 100.0), (0.0, 100.0)],
        };
        let p = cfg.params_for(&geom);
        assert_eq!(p.center, (55.0, 50.0));
        let sv = p.side_view.unwrap();
        assert_eq!(sv.axis, SideViewAxis::LeftTopToRightBottom);
        assert_eq!(sv.zone1_percent, 50.0);
        assert_eq!(sv.zone2_percent, 33.0);
        assert!(cfg.bad_cell_keys().is_empty());
    }

    #[test]
    fn unknown_endpoint_name_fails_to_parse() {
        let r: std::result::Result<AnalysisConfig, _> = toml::from_str(r#"selected_endpoints = ["Velocity"]"#);
        assert!(r.is_err());
    }

    #[test]
    fn validation() {
        let mut p = AnalysisConfig::default().params_for(&CellGeometry {
            id: 1,
            center: (0.0, 0.0),
            corners: [(0.0, 0.0); 4],
        });
        p.validate().unwrap();

        p.frame_rate = 0.0;
        assert!(matches!(p.validate(), Err(EthoError::Configuration { .. })));
        p.frame_rate = 30.0;
        p.side_view = None;
        assert!(p.validate().is_err());
        p.mode = AnalysisMode::TopView;
        p.validate().unwrap();
    }
}
