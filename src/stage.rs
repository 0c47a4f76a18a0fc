//! Results passed between pipeline stages.
//!
//! Every stage contains its own failures and reports them as a
//! [`StageFailure`] carrying an HTTP-like status code and a message. The
//! orchestrator composes these values and never sees a raised error.

use crate::provenance::ActivityRecord;
use serde::{Deserialize, Serialize};

/// Status code of a successful stage or run.
pub const STATUS_OK: u16 = 200;

/// Classification of a stage failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// No input reference supplied.
    MissingInput,
    /// Required local directories absent or misconfigured.
    EnvironmentNotReady,
    /// Input extension is not one the worker transcodes.
    UnsupportedFormat,
    /// Download or extraction of the input failed.
    AcquisitionFailure,
    /// External tool failed or could not be spawned.
    TranscodeFailure,
    /// The provenance document could not be written.
    ProvenanceFailure,
    /// Output could not be pushed to the remote store.
    TransferFailure,
    /// Requested deletion of the input file failed.
    InputCleanupFailure,
}

impl FailureKind {
    /// HTTP-like status code reported for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            FailureKind::MissingInput => 403,
            _ => 500,
        }
    }
}

/// A contained stage failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl StageFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn status_code(&self) -> u16 {
        self.kind.status_code()
    }
}

impl std::fmt::Display for StageFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.status_code())
    }
}

/// Output of a successful stage.
#[derive(Debug, Clone)]
pub struct StageOutput<T> {
    pub message: String,
    pub payload: T,
    /// Record of the work performed; `None` when nothing was timed.
    pub provenance: Option<ActivityRecord>,
}

impl<T> StageOutput<T> {
    pub fn new(message: impl Into<String>, payload: T) -> Self {
        Self {
            message: message.into(),
            payload,
            provenance: None,
        }
    }

    pub fn with_provenance(mut self, record: ActivityRecord) -> Self {
        self.provenance = Some(record);
        self
    }
}

/// Result of a single stage.
pub type StageResult<T> = std::result::Result<StageOutput<T>, StageFailure>;

/// Uniform `{state, message}` response returned by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackResponse {
    pub state: u16,
    pub message: String,
}

impl CallbackResponse {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            state: STATUS_OK,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == STATUS_OK
    }
}

impl From<StageFailure> for CallbackResponse {
    fn from(failure: StageFailure) -> Self {
        Self {
            state: failure.status_code(),
            message: failure.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(FailureKind::MissingInput.status_code(), 403);
        assert_eq!(FailureKind::UnsupportedFormat.status_code(), 500);
        assert_eq!(FailureKind::InputCleanupFailure.status_code(), 500);
    }

    #[test]
    fn test_failure_to_response() {
        let failure = StageFailure::new(FailureKind::TransferFailure, "Failed to transfer output to S3");
        let response = CallbackResponse::from(failure);
        assert_eq!(response.state, 500);
        assert_eq!(response.message, "Failed to transfer output to S3");
        assert!(!response.is_success());
    }

    #[test]
    fn test_response_serializes_as_state_and_message() {
        let json = serde_json::to_value(CallbackResponse::success("ok")).unwrap();
        assert_eq!(json, serde_json::json!({"state": 200, "message": "ok"}));
    }
}
