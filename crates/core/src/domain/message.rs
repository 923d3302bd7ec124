// Queue Message Schemas
// Wire format: one UTF-8 JSON object per message body.
// Unknown extra fields are ignored on read.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Ticket identifier, unique per submission
pub type TicketNumber = String;

/// Boundary validation error for queue messages
///
/// Distinguishes a body that is not a message at all (`Malformed`)
/// from one that parsed but carries unusable field values
/// (`Incomplete`). Both are poison from the consumer's point of view,
/// but they are logged as different data-quality issues.
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("malformed message body: {0}")]
    Malformed(String),

    #[error("message field '{field}' is {problem}")]
    Incomplete {
        field: &'static str,
        problem: &'static str,
    },
}

/// Job record published to the forwarding queue by intake
///
/// Storage keys are well-formed at creation time; the artifacts they
/// name are not guaranteed to exist until the worker writes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobMessage {
    pub ticket_number: TicketNumber,
    pub email: String,
    pub source_object_path: String,
    pub result_artifact_path: String,
    pub auxiliary_artifact_path: String,
}

/// Result record published to the feedback queue by the worker
///
/// Carries every JobMessage field plus the classification score,
/// which may be absent when the model produced no usable detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMessage {
    #[serde(flatten)]
    pub job: JobMessage,
    pub classification_score: Option<f64>,
}

impl JobMessage {
    /// Deserialize and validate a queue message body
    pub fn from_bytes(body: &[u8]) -> Result<Self, SchemaError> {
        let message: JobMessage =
            serde_json::from_slice(body).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        message.validate()?;
        Ok(message)
    }

    /// Serialize to the canonical wire encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Check field-level invariants after a successful parse
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.ticket_number.is_empty() {
            return Err(SchemaError::Incomplete {
                field: "ticket_number",
                problem: "empty",
            });
        }
        validate_email("email", &self.email)?;
        validate_storage_key("source_object_path", &self.source_object_path)?;
        validate_storage_key("result_artifact_path", &self.result_artifact_path)?;
        validate_storage_key("auxiliary_artifact_path", &self.auxiliary_artifact_path)?;
        Ok(())
    }
}

impl ResultMessage {
    /// Build the feedback record for a completed job
    pub fn for_completed(job: JobMessage, classification_score: Option<f64>) -> Self {
        Self {
            job,
            classification_score,
        }
    }

    /// Deserialize and validate a feedback queue message body
    pub fn from_bytes(body: &[u8]) -> Result<Self, SchemaError> {
        let message: ResultMessage =
            serde_json::from_slice(body).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        message.job.validate()?;
        Ok(message)
    }

    /// Serialize to the canonical wire encoding
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

fn validate_email(field: &'static str, value: &str) -> Result<(), SchemaError> {
    if value.is_empty() {
        return Err(SchemaError::Incomplete {
            field,
            problem: "empty",
        });
    }
    // Not a full RFC 5322 check; intake owns that. This only rejects
    // values that cannot possibly be routable.
    let mut parts = value.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() {
        return Err(SchemaError::Incomplete {
            field,
            problem: "not a routable address",
        });
    }
    Ok(())
}

fn validate_storage_key(field: &'static str, value: &str) -> Result<(), SchemaError> {
    if value.is_empty() {
        return Err(SchemaError::Incomplete {
            field,
            problem: "empty",
        });
    }
    if value.starts_with('/') || value.ends_with('/') {
        return Err(SchemaError::Incomplete {
            field,
            problem: "not a well-formed storage key",
        });
    }
    if value.split('/').any(|segment| segment.is_empty() || segment == "..") {
        return Err(SchemaError::Incomplete {
            field,
            problem: "not a well-formed storage key",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_job() -> JobMessage {
        JobMessage {
            ticket_number: "ab12cd".to_string(),
            email: "x@y.com".to_string(),
            source_object_path: "audio/a.wav".to_string(),
            result_artifact_path: "results/a_annot.txt".to_string(),
            auxiliary_artifact_path: "spectrograms/a_spectro.pt".to_string(),
        }
    }

    #[test]
    fn test_roundtrip_preserves_all_fields() {
        let job = valid_job();
        let bytes = job.to_bytes().unwrap();
        let parsed = JobMessage::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, job);
    }

    #[test]
    fn test_result_roundtrip_flattens_job_fields() {
        let result = ResultMessage::for_completed(valid_job(), Some(0.92));
        let bytes = result.to_bytes().unwrap();

        // Flattened encoding: job fields at the top level
        let value: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(value["ticket_number"], "ab12cd");
        assert_eq!(value["classification_score"], 0.92);

        let parsed = ResultMessage::from_bytes(&bytes).unwrap();
        assert_eq!(parsed, result);
    }

    #[test]
    fn test_unknown_fields_are_ignored() {
        let body = json!({
            "ticket_number": "ab12cd",
            "email": "x@y.com",
            "source_object_path": "audio/a.wav",
            "result_artifact_path": "results/a_annot.txt",
            "auxiliary_artifact_path": "spectrograms/a_spectro.pt",
            "deployment_region": "eu-west-3"
        });
        let parsed = JobMessage::from_bytes(body.to_string().as_bytes()).unwrap();
        assert_eq!(parsed, valid_job());
    }

    #[test]
    fn test_not_json_is_malformed() {
        let err = JobMessage::from_bytes(b"definitely not json").unwrap_err();
        assert!(matches!(err, SchemaError::Malformed(_)));
    }

    #[test]
    fn test_missing_field_is_malformed() {
        let body = json!({ "ticket_number": "ab12cd", "email": "x@y.com" });
        let err = JobMessage::from_bytes(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, SchemaError::Malformed(_)));
    }

    #[test]
    fn test_empty_ticket_is_incomplete() {
        let mut job = valid_job();
        job.ticket_number = String::new();
        let err = job.validate().unwrap_err();
        assert!(matches!(
            err,
            SchemaError::Incomplete {
                field: "ticket_number",
                ..
            }
        ));
    }

    #[test]
    fn test_unroutable_email_is_incomplete() {
        for bad in ["", "no-at-sign", "@y.com", "x@"] {
            let mut job = valid_job();
            job.email = bad.to_string();
            assert!(job.validate().is_err(), "accepted email: {bad:?}");
        }
    }

    #[test]
    fn test_bad_storage_keys_are_incomplete() {
        for bad in ["", "/absolute/key", "trailing/", "a//b", "a/../b"] {
            let mut job = valid_job();
            job.source_object_path = bad.to_string();
            assert!(job.validate().is_err(), "accepted key: {bad:?}");
        }
    }

    #[test]
    fn test_score_may_be_null() {
        let result = ResultMessage::for_completed(valid_job(), None);
        let bytes = result.to_bytes().unwrap();
        let parsed = ResultMessage::from_bytes(&bytes).unwrap();
        assert_eq!(parsed.classification_score, None);
    }
}
