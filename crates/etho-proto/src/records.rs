use serde::{Deserialize, Serialize};

/// 1-based, row-major cell number.
pub type CellId = u32;

/// One observed animal in one frame, after numeric normalisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub frame_idx: u64,
    // pixel box, all four or none
    pub x1: Option<f64>,
    pub y1: Option<f64>,
    pub x2: Option<f64>,
    pub y2: Option<f64>,
    pub cx: Option<f64>,
    pub cy: Option<f64>,
    pub class_name: String,
    pub conf: f64,
    #[serde(default)]
    pub cell_id: Option<CellId>,
}

impl Detection {
    pub fn centroid(&self) -> Option<(f64, f64)> {
        Some((self.cx?, self.cy?))
    }

    /// Fill `cx/cy` from the box midpoint when they are missing.
    pub fn fill_centroid(&mut self) {
        if self.cx.is_some() && self.cy.is_some() {
            return;
        }
        if let (Some(x1), Some(y1), Some(x2), Some(y2)) = (self.x1, self.y1, self.x2, self.y2) {
            self.cx = Some((x1 + x2) / 2.0);
            self.cy = Some((y1 + y2) / 2.0);
        }
    }
}

/// Inclusive run of frames in one cell sharing one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelineSegment {
    pub start_frame: u64,
    pub end_frame: u64,
    pub label: String,
}

impl TimelineSegment {
    pub fn frame_count(&self) -> u64 {
        self.end_frame - self.start_frame + 1
    }

    pub fn contains(&self, frame: u64) -> bool {
        (self.start_frame..=self.end_frame).contains(&frame)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackedPoint {
    pub frame_idx: u64,
    pub x: f64,
    pub y: f64,
    pub id: u64,
}

/// All points that received one persistent id, ordered by frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPath {
    pub id: u64,
    pub points: Vec<(u64, f64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "cell", rename_all = "snake_case")]
pub enum RowScope {
    Cell(CellId),
    Average,
    GrandAverage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointEntry {
    pub name: String,
    pub value: String,
}

/// One row of the endpoint table: a (file, cell) pair or an aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointRow {
    pub file: String,
    pub scope: RowScope,
    pub values: Vec<EndpointEntry>,
}

impl EndpointRow {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.iter().find(|e| e.name == name).map(|e| e.value.as_str())
    }
}
