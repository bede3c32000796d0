pub mod error;
pub mod records;

pub use error::{EthoError, Result};
pub use records::{
    CellId, Detection, EndpointEntry, EndpointRow, RowScope, TimelineSegment, TrackPath,
    TrackedPoint,
};
