//! Progress updates published by the transfer and verify engines.

use serde::Serialize;

/// Which operation is reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Transfer,
    Verify,
}

/// Processed count against the expected total.
///
/// Sent once per committed batch (transfer) or per sample (verify);
/// `processed` never decreases within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressUpdate {
    pub phase: Phase,
    pub processed: u64,
    pub total: u64,
}
