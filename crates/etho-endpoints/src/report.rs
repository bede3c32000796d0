use std::collections::BTreeMap;

use tracing::{debug, warn};

use etho_grid::CellGeometry;
use etho_proto::{CellId, EndpointEntry, EndpointRow, EthoError, Result, RowScope};

use crate::analyzer::{EndpointValue, EndpointsAnalyzer};
use crate::params::{AnalysisConfig, Endpoint};

/// Cells with fewer samples are left out of the report.
pub const MIN_CELL_SAMPLES: usize = 3;

pub const GRAND_AVERAGE: &str = "GRAND AVERAGE";

#[derive(Debug, Clone, PartialEq)]
pub struct CellResult {
    pub cell: CellId,
    pub values: Vec<(Endpoint, EndpointValue)>,
}

impl CellResult {
    pub fn to_row(&self, file: &str) -> EndpointRow {
        EndpointRow {
            file: file.to_string(),
            scope: RowScope::Cell(self.cell),
            values: self
                .values
                .iter()
                .map(|(e, v)| EndpointEntry { name: e.name().to_string(), value: v.formatted() })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileResult {
    pub file: String,
    pub cells: Vec<CellResult>,
    /// Why cells were left out.
    pub skipped: Vec<EthoError>,
}

impl FileResult {
    /// One row per analysed cell, then the file's AVERAGE row.
    pub fn rows(&self) -> Vec<EndpointRow> {
        let mut rows: Vec<EndpointRow> = self.cells.iter().map(|c| c.to_row(&self.file)).collect();
        if !self.cells.is_empty() {
            rows.push(EndpointRow {
                file: self.file.clone(),
                scope: RowScope::Average,
                values: mean_entries(self.cells.iter()),
            });
        }
        rows
    }
}

/// Column-wise mean, columns in first-seen order, formatted like reals.
fn mean_entries<'a>(cells: impl Iterator<Item = &'a CellResult>) -> Vec<EndpointEntry> {
    let mut order: Vec<Endpoint> = Vec::new();
    let mut sums: BTreeMap<Endpoint, (f64, usize)> = BTreeMap::new();
    for c in cells {
        for (e, v) in &c.values {
            let slot = sums.entry(*e).or_insert_with(|| {
                order.push(*e);
                (0.0, 0)
            });
            slot.0 += v.as_f64();
            slot.1 += 1;
        }
    }
    order
        .into_iter()
        .map(|e| {
            let (sum, n) = sums[&e];
            EndpointEntry { name: e.name().to_string(), value: EndpointValue::Real(sum / n as f64).formatted() }
        })
        .collect()
}

/// Analyse every cell of one file.
///
/// Cells below [`MIN_CELL_SAMPLES`], cells outside the grid and cells whose
/// analysis hits a recoverable error are logged and skipped. A configuration
/// error aborts the file.
pub fn analyze_file(
    file: &str,
    samples: &BTreeMap<CellId, Vec<(u64, f64, f64)>>,
    cfg: &AnalysisConfig,
    geometry: &[CellGeometry],
) -> Result<FileResult> {
    let mut out = FileResult { file: file.to_string(), ..Default::default() };

    for (&cell, cell_samples) in samples {
        if cell_samples.len() < MIN_CELL_SAMPLES {
            let e = EthoError::insufficient(Some(cell), MIN_CELL_SAMPLES, cell_samples.len());
            warn!(file = %file, "skipping cell: {}", e);
            out.skipped.push(e);
            continue;
        }
        let Some(geom) = geometry.iter().find(|g| g.id == cell) else {
            let e = EthoError::configuration(format!("cell {} is not part of the grid", cell));
            warn!(file = %file, "skipping cell: {}", e);
            out.skipped.push(e);
            continue;
        };

        let analyzer = EndpointsAnalyzer::new(cfg.params_for(geom)).map_err(|e| e.in_cell(cell))?;
        match analyzer.analyze(cell_samples) {
            Ok(values) => out.cells.push(CellResult { cell, values }),
            Err(e) if e.is_recoverable() => {
                let e = e.in_cell(cell);
                warn!(file = %file, "skipping cell: {}", e);
                out.skipped.push(e);
            }
            Err(e) => return Err(e),
        }
    }

    debug!(file = %file, cells = out.cells.len(), skipped = out.skipped.len(), "analysed file");
    Ok(out)
}

/// Mean of every cell row across all files.
pub fn grand_average(files: &[FileResult]) -> Option<EndpointRow> {
    let mut cells = files.iter().flat_map(|f| f.cells.iter()).peekable();
    cells.peek()?;
    Some(EndpointRow {
        file: GRAND_AVERAGE.to_string(),
        scope: RowScope::GrandAverage,
        values: mean_entries(cells),
    })
}

/// Every file's rows followed by the GRAND AVERAGE row.
pub fn report_rows(files: &[FileResult]) -> Vec<EndpointRow> {
    let mut rows: Vec<EndpointRow> = files.iter().flat_map(FileResult::rows).collect();
    rows.extend(grand_average(files));
    rows
}

/// Shared stem of the input file names, used to name the report.
pub fn report_stem<S: AsRef<str>>(file_names: &[S]) -> String {
    let stems: Vec<&str> = file_names
        .iter()
        .map(|n| {
            let base = n.as_ref().rsplit(['/', '\\']).next().unwrap_or_default();
            base.rsplit_once('.').map_or(base, |(stem, _)| stem)
        })
        .collect();

    let Some(first) = stems.first() else {
        return "analysis".to_string();
    };
    let mut len = first.len();
    for s in &stems[1..] {
        len = first
            .char_indices()
            .zip(s.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map_or(0, |((i, a), _)| i + a.len_utf8())
            .min(len);
    }
    let prefix = first[..len].trim_matches(|c| c == '_' || c == '-' || c == ' ');
    if prefix.is_empty() {
        "analysis".to_string()
    } else {
        prefix.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{AnalysisMode, CellOverride};

    fn geometry() -> Vec<CellGeometry> {
        (1..=2)
            .map(|id| {
                let x0 = (id - 1) as f64 * 100.0;
                CellGeometry {
                    id,
                    center: (x0 + 50.0, 50.0),
                    corners: [(x0, 0.0), (x0 + 100.0, 0.0), (x0 + 100.0, 100.0), (x0, 100.0)],
                }
            })
            .collect()
    }

    fn cfg() -> AnalysisConfig {
        AnalysisConfig {
            mode: AnalysisMode::TopView,
            conversion_rate: 1.0,
            frame_rate: 1.0,
            selected_endpoints: vec![Endpoint::TotalDistance, Endpoint::AverageSpeed],
            ..Default::default()
        }
    }

    fn line(x0: f64, step: f64, n: u64) -> Vec<(u64, f64, f64)> {
        (0..n).map(|f| (f, x0 + step * f as f64, 50.0)).collect()
    }

    #[test]
    fn short_cells_are_skipped_and_averaged_rows_follow() {
        let samples = BTreeMap::from([(1, line(10.0, 1.0, 5)), (2, line(110.0, 3.0, 5)), (3, line(0.0, 1.0, 2))]);
        let fr = analyze_file("a.json", &samples, &cfg(), &geometry()).unwrap();
        assert_eq!(fr.cells.len(), 2);
        assert_eq!(fr.skipped, vec![EthoError::insufficient(Some(3), 3, 2)]);

        let rows = fr.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].scope, RowScope::Cell(1));
        assert_eq!(rows[0].get("Total Distance (cm)"), Some("4.0000"));
        assert_eq!(rows[1].get("Average Speed (cm/s)"), Some("3.0000"));
        assert_eq!(rows[2].scope, RowScope::Average);
        assert_eq!(rows[2].get("Total Distance (cm)"), Some("8.0000"));
        assert_eq!(rows[2].get("Average Speed (cm/s)"), Some("2.0000"));
    }

    #[test]
    fn cell_override_moves_the_centre() {
        const LABEL: &str = "Average Distance from Center (cm)";
        let samples = BTreeMap::from([(1, line(10.0, 1.0, 5)), (2, line(110.0, 3.0, 5))]);
        let base = AnalysisConfig { selected_endpoints: vec![Endpoint::AverageDistanceFromCenter], ..cfg() };

        // x 10..14 against centre x 50; x 110..122 against centre x 150
        let rows = analyze_file("a.json", &samples, &base, &geometry()).unwrap().rows();
        assert_eq!(rows[0].get(LABEL), Some("38.0000"));
        assert_eq!(rows[1].get(LABEL), Some("34.0000"));

        let shifted = AnalysisConfig {
            cells: BTreeMap::from([("1".to_string(), CellOverride { center_dx: 10.0, ..Default::default() })]),
            ..base
        };
        let rows = analyze_file("a.json", &samples, &shifted, &geometry()).unwrap().rows();
        assert_eq!(rows[0].get(LABEL), Some("48.0000"));
        assert_eq!(rows[1].get(LABEL), Some("34.0000"));
    }

    #[test]
    fn cells_outside_the_grid_are_skipped() {
        let samples = BTreeMap::from([(9, line(0.0, 1.0, 5))]);
        let fr = analyze_file("a.json", &samples, &cfg(), &geometry()).unwrap();
        assert!(fr.cells.is_empty());
        assert_eq!(fr.skipped.len(), 1);
        assert!(fr.rows().is_empty());
    }

    #[test]
    fn bad_conversion_rate_aborts_the_file() {
        let samples = BTreeMap::from([(1, line(0.0, 1.0, 5))]);
        let bad = AnalysisConfig { conversion_rate: 0.0, ..cfg() };
        let err = analyze_file("a.json", &samples, &bad, &geometry()).unwrap_err();
        assert!(!err.is_recoverable());
    }

    #[test]
    fn grand_average_spans_every_cell_row() {
        let a = analyze_file("a.json", &BTreeMap::from([(1, line(0.0, 1.0, 5)), (2, line(100.0, 1.0, 5))]), &cfg(), &geometry()).unwrap();
        let b = analyze_file("b.json", &BTreeMap::from([(1, line(0.0, 4.0, 5))]), &cfg(), &geometry()).unwrap();
        let rows = report_rows(&[a, b]);
        // 2 cells + avg, 1 cell + avg, grand
        assert_eq!(rows.len(), 6);
        let grand = rows.last().unwrap();
        assert_eq!(grand.file, GRAND_AVERAGE);
        assert_eq!(grand.scope, RowScope::GrandAverage);
        // (1 + 1 + 4) / 3 over cells, not over the two file averages
        assert_eq!(grand.get("Average Speed (cm/s)"), Some("2.0000"));
        assert!(grand_average(&[]).is_none());
    }

    #[test]
    fn stem_from_common_prefix() {
        assert_eq!(report_stem(&["runs/tank_day1_a.json", "runs/tank_day1_b.json"]), "tank_day1");
        assert_eq!(report_stem(&["x.json"]), "x");
        assert_eq!(report_stem(&["abc.json", "xyz.json"]), "analysis");
        assert_eq!(report_stem::<&str>(&[]), "analysis");
    }
}
