use thiserror::Error;

/// Failures raised by the scoring pipeline.
///
/// `InvalidRecord` is local to one row and never aborts a run; the other two
/// variants are fatal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("invalid record {employee_id}: {reason}")]
    InvalidRecord { employee_id: String, reason: String },

    #[error("no valid employee records to analyze")]
    EmptyDataset,

    #[error("no category resolved for employee {employee_id}")]
    UnknownCategory { employee_id: String },
}

impl AnalysisError {
    pub fn invalid(employee_id: impl Into<String>, reason: impl Into<String>) -> Self {
        AnalysisError::InvalidRecord {
            employee_id: employee_id.into(),
            reason: reason.into(),
        }
    }
}
