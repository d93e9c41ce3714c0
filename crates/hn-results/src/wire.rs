//! JSON shapes of the simulation endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::history::SimulationHistory;
use crate::types::SimulationSnapshot;

/// `{ "inp": "..." }`. A missing `inp` is rejected by the service, not by
/// deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    #[serde(default)]
    pub inp: Option<String>,
}

impl SimulationRequest {
    pub fn new(inp: impl Into<String>) -> Self {
        Self {
            inp: Some(inp.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    pub timestamps: Vec<u64>,
    pub snapshots: Vec<SimulationSnapshot>,
    /// Milliseconds since the Unix epoch.
    pub generated_at: i64,
}

impl SimulationResponse {
    pub fn new(history: SimulationHistory, generated_at: DateTime<Utc>) -> Self {
        let (timestamps, snapshots) = history.into_parts();
        Self {
            timestamps,
            snapshots,
            generated_at: generated_at.timestamp_millis(),
        }
    }

    pub fn into_history(self) -> crate::ResultsResult<SimulationHistory> {
        SimulationHistory::from_parts(self.timestamps, self.snapshots)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// Either endpoint body, serialized without a tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SimulationReply {
    Success(SimulationResponse),
    Failure(ErrorResponse),
}

impl SimulationReply {
    pub fn is_success(&self) -> bool {
        matches!(self, SimulationReply::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn request_tolerates_missing_inp() {
        let req: SimulationRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(req.inp, None);
    }

    #[test]
    fn response_uses_camel_case_millis() {
        let at = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let resp = SimulationResponse::new(
            SimulationHistory::from_parts(vec![0], vec![SimulationSnapshot::default()]).unwrap(),
            at,
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["generatedAt"], 1_700_000_000_123_i64);
        assert_eq!(json["timestamps"][0], 0);
    }

    #[test]
    fn error_omits_empty_details() {
        let json = serde_json::to_string(&ErrorResponse::new("No INP data provided")).unwrap();
        assert_eq!(json, r#"{"error":"No INP data provided"}"#);
        let reply: SimulationReply =
            serde_json::from_str(r#"{"error":"Simulation failed","details":"Input error: x"}"#)
                .unwrap();
        assert!(!reply.is_success());
    }
}
