// Artifact Storage Key Derivation
// Intake reserves three storage keys per submission: the uploaded
// source, the annotation output, and the spectrogram output. Keys are
// prefixed with the submission timestamp so repeated uploads of the
// same filename never collide.

use chrono::{DateTime, Utc};

const SOURCE_PREFIX: &str = "audio";
const RESULT_PREFIX: &str = "annotations";
const AUXILIARY_PREFIX: &str = "spectrograms";

/// Storage keys reserved for one submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactKeys {
    pub source: String,
    pub result: String,
    pub auxiliary: String,
}

impl ArtifactKeys {
    /// Derive the three keys for an uploaded file
    ///
    /// `original_filename` keeps its extension in the source key; the
    /// result key swaps it for the `_annot.txt` annotation suffix and
    /// the auxiliary key for the `_spectro.pt` spectrogram suffix.
    pub fn derive(original_filename: &str, submitted_at: DateTime<Utc>) -> Self {
        let timestamp = submitted_at.format("%Y%m%d%H%M%S%f");
        let stem = match original_filename.rsplit_once('.') {
            Some((stem, _ext)) if !stem.is_empty() => stem,
            _ => original_filename,
        };

        Self {
            source: format!("{SOURCE_PREFIX}/{timestamp}_{original_filename}"),
            result: format!("{RESULT_PREFIX}/{timestamp}_{stem}_annot.txt"),
            auxiliary: format!("{AUXILIARY_PREFIX}/{timestamp}_{stem}_spectro.pt"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_derive_keys_share_timestamp_prefix() {
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap();
        let keys = ArtifactKeys::derive("Turdus_merula.wav", at);

        assert_eq!(keys.source, "audio/20240314092653000000000_Turdus_merula.wav");
        assert_eq!(
            keys.result,
            "annotations/20240314092653000000000_Turdus_merula_annot.txt"
        );
        assert_eq!(
            keys.auxiliary,
            "spectrograms/20240314092653000000000_Turdus_merula_spectro.pt"
        );
    }

    #[test]
    fn test_derive_keys_without_extension() {
        let at = Utc.with_ymd_and_hms(2024, 3, 14, 9, 26, 53).unwrap();
        let keys = ArtifactKeys::derive("recording", at);
        assert!(keys.result.ends_with("_recording_annot.txt"));
        assert!(keys.auxiliary.ends_with("_recording_spectro.pt"));
    }

    #[test]
    fn test_derived_keys_pass_message_validation() {
        let keys = ArtifactKeys::derive("a.wav", Utc::now());
        let job = crate::domain::JobMessage {
            ticket_number: "ab12cd".to_string(),
            email: "x@y.com".to_string(),
            source_object_path: keys.source,
            result_artifact_path: keys.result,
            auxiliary_artifact_path: keys.auxiliary,
        };
        assert!(job.validate().is_ok());
    }
}
