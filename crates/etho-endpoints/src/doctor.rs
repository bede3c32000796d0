use anyhow::Result;

use crate::params::AnalysisConfig;

pub fn check_analysis(cfg: &AnalysisConfig) -> Result<()> {
    anyhow::ensure!(
        cfg.conversion_rate.is_finite() && cfg.conversion_rate > 0.0,
        "analysis.conversion_rate must be > 0"
    );
    anyhow::ensure!(cfg.frame_rate.is_finite() && cfg.frame_rate > 0.0, "analysis.frame_rate must be > 0");
    anyhow::ensure!(
        cfg.rapid_threshold >= 0.0 && cfg.freezing_threshold >= 0.0,
        "analysis speed thresholds must be >= 0"
    );
    for (name, v) in [("zone1_percent", cfg.zone1_percent), ("zone2_percent", cfg.zone2_percent)] {
        anyhow::ensure!((0.0..=100.0).contains(&v), "analysis.{} must be within 0..=100", name);
    }

    let bad = cfg.bad_cell_keys();
    anyhow::ensure!(bad.is_empty(), "analysis.cells has keys that are not cell ids: {:?}", bad);
    for (id, ov) in &cfg.cells {
        for v in [ov.zone1_percent, ov.zone2_percent].into_iter().flatten() {
            anyhow::ensure!((0.0..=100.0).contains(&v), "analysis.cells.{}: zone percent {} outside 0..=100", id, v);
        }
    }

    for e in cfg.selected() {
        anyhow::ensure!(e.available_in(cfg.mode), "endpoint {:?} is not computed in {:?} mode", e.name(), cfg.mode);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{AnalysisMode, CellOverride, Endpoint};

    #[test]
    fn defaults_pass() {
        check_analysis(&AnalysisConfig::default()).unwrap();
        let top = AnalysisConfig { mode: AnalysisMode::TopView, ..Default::default() };
        check_analysis(&top).unwrap();
    }

    #[test]
    fn rejects_mismatched_endpoint_and_bad_cells() {
        let cfg = AnalysisConfig { selected_endpoints: vec![Endpoint::Meandering], ..Default::default() };
        assert!(check_analysis(&cfg).is_err());

        let mut cfg = AnalysisConfig::default();
        cfg.cells.insert("tank".into(), CellOverride::default());
        assert!(check_analysis(&cfg).is_err());

        let mut cfg = AnalysisConfig::default();
        cfg.cells.insert("2".into(), CellOverride { zone2_percent: Some(120.0), ..Default::default() });
        assert!(check_analysis(&cfg).is_err());

        let cfg = AnalysisConfig { conversion_rate: -1.0, ..Default::default() };
        assert!(check_analysis(&cfg).is_err());
    }
}
