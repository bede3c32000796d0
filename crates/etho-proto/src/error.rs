//! Error taxonomy shared by the grid, vision and endpoint crates.

use thiserror::Error;

use crate::records::CellId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EthoError {
    /// The unit of work (video, tank, file) cannot proceed with this configuration.
    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    /// Too few samples for a computation; only the affected cell/endpoint is skipped.
    #[error("insufficient data{}: need at least {min} samples, got {actual}", fmt_cell(.cell))]
    InsufficientData {
        cell: Option<CellId>,
        min: usize,
        actual: usize,
    },

    /// A numeric field failed to parse; callers substitute a default and continue.
    #[error("malformed input at frame {frame}: field `{field}` = {value:?}")]
    MalformedInput {
        frame: u64,
        field: &'static str,
        value: String,
    },
}

pub type Result<T> = std::result::Result<T, EthoError>;

fn fmt_cell(cell: &Option<CellId>) -> String {
    match cell {
        Some(c) => format!(" in cell {}", c),
        None => String::new(),
    }
}

impl EthoError {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration { reason: reason.into() }
    }

    pub const fn insufficient(cell: Option<CellId>, min: usize, actual: usize) -> Self {
        Self::InsufficientData { cell, min, actual }
    }

    pub fn malformed(frame: u64, field: &'static str, value: impl Into<String>) -> Self {
        Self::MalformedInput { frame, field, value: value.into() }
    }

    /// Attach a cell id to an `InsufficientData` error raised without one.
    pub fn in_cell(self, id: CellId) -> Self {
        match self {
            Self::InsufficientData { cell: None, min, actual } => {
                Self::InsufficientData { cell: Some(id), min, actual }
            }
            other => other,
        }
    }

    /// Recoverable errors skip one cell or field; the rest abort the unit of work.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Configuration { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insufficient_data_names_the_cell() {
        let err = EthoError::insufficient(None, 3, 1).in_cell(4);
        let msg = err.to_string();
        assert!(msg.contains("cell 4"), "{msg}");
        assert!(msg.contains('3') && msg.contains('1'));
        assert!(err.is_recoverable());
    }

    #[test]
    fn configuration_is_fatal_for_the_unit() {
        let err = EthoError::configuration("grid transform is not invertible");
        assert!(!err.is_recoverable());
        assert_eq!(err.to_string(), "configuration error: grid transform is not invertible");
    }

    #[test]
    fn malformed_input_reports_frame_and_field() {
        let err = EthoError::malformed(12, "conf", "");
        assert_eq!(err.to_string(), "malformed input at frame 12: field `conf` = \"\"");
    }
}
