//! Portable bank documents.
//!
//! A bank is a JSON document carrying every stored sample's encoded channel data as base64:
//!
//! ```json
//! {"formatVersion":"2.0.0","exportedAt":"2026-01-01T00:00:00+00:00",
//!  "samples":[{"padId":"pad-0","label":"kick","channelData":"AgAAAA..."}]}
//! ```

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::sample_codec::{CodecError, StoredSample};

/// The only bank format version this crate reads or writes.
pub const FORMAT_VERSION: &str = "2.0.0";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDocument {
    pub format_version: String,
    pub exported_at: String,
    pub samples: Vec<BankEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankEntry {
    pub pad_id: String,
    pub label: String,
    /// Base64 of the codec bytes.
    pub channel_data: String,
}

/// Only the version field, read before the rest so that documents of another version report
/// a version mismatch rather than a shape error.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionProbe {
    format_version: String,
}

/// Serializes stored records into bank transfer text.
pub fn to_transfer_text(
    samples: &[StoredSample],
    exported_at: DateTime<Utc>,
) -> Result<String, CodecError> {
    let document = BankDocument {
        format_version: FORMAT_VERSION.to_string(),
        exported_at: exported_at.to_rfc3339(),
        samples: samples
            .iter()
            .map(|sample| BankEntry {
                pad_id: sample.pad_id.clone(),
                label: sample.label.clone(),
                channel_data: BASE64.encode(&sample.channel_data),
            })
            .collect(),
    };
    Ok(serde_json::to_string(&document)?)
}

/// Parses bank transfer text into stored records.
///
/// Either every record is returned or an error is; a single bad record fails the whole
/// document. Imported records take their shape from the decoded channel data and are stamped
/// with `imported_at`.
pub fn from_transfer_text(
    text: &str,
    imported_at: DateTime<Utc>,
) -> Result<Vec<StoredSample>, CodecError> {
    let probe: VersionProbe = serde_json::from_str(text)?;
    if probe.format_version != FORMAT_VERSION {
        return Err(CodecError::IncompatibleVersion {
            found: probe.format_version,
        });
    }

    let document: BankDocument = serde_json::from_str(text)?;
    document
        .samples
        .into_iter()
        .map(|entry| -> Result<StoredSample, CodecError> {
            let channel_data = BASE64.decode(entry.channel_data.as_bytes())?;
            let record =
                StoredSample::from_channel_data(&entry.pad_id, &entry.label, channel_data, imported_at)?;
            // Reject data whose header is valid but whose body is not.
            record.decode_buffer()?;
            Ok(record)
        })
        .collect()
}

/// Suggested file name for a bank exported on `date`.
pub fn export_file_name(date: NaiveDate) -> String {
    format!("musicpad-bank-{}.json", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_engine::errors::ErrorKind;
    use crate::messages::SampleBuffer;

    fn record(pad_id: &str, value: f32) -> StoredSample {
        let buffer = SampleBuffer::from_channels(44_100, vec![vec![value; 8]]).unwrap();
        StoredSample::from_buffer(pad_id, pad_id, &buffer, Utc::now()).unwrap()
    }

    #[test]
    fn test_document_field_names() {
        let text = to_transfer_text(&[record("pad-0", 0.5)], Utc::now()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();

        assert_eq!(value["formatVersion"], "2.0.0");
        assert!(value["exportedAt"].is_string());
        assert_eq!(value["samples"][0]["padId"], "pad-0");
        assert_eq!(value["samples"][0]["label"], "pad-0");
        assert!(value["samples"][0]["channelData"].is_string());
    }

    #[test]
    fn test_transfer_preserves_records_and_order() {
        let records = vec![record("pad-2", 0.25), record("pad-0", -0.75)];
        let text = to_transfer_text(&records, Utc::now()).unwrap();

        let imported_at = Utc::now();
        let imported = from_transfer_text(&text, imported_at).unwrap();

        assert_eq!(imported.len(), 2);
        assert_eq!(imported[0].pad_id, "pad-2");
        assert_eq!(imported[1].pad_id, "pad-0");
        for (original, restored) in records.iter().zip(&imported) {
            assert_eq!(original.channel_data, restored.channel_data);
            assert_eq!(original.frame_count, restored.frame_count);
            assert_eq!(restored.byte_size, restored.channel_data.len());
            assert_eq!(restored.saved_at, imported_at);
        }
    }

    #[test]
    fn test_wrong_version_is_incompatible() {
        let text = r#"{"formatVersion":"1.0.0","samples":{}}"#;
        let err = from_transfer_text(text, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::IncompatibleFormat);
    }

    #[test]
    fn test_malformed_envelope_is_corrupt() {
        for text in ["not json", r#"{"formatVersion":"2.0.0"}"#, "{}"] {
            let err = from_transfer_text(text, Utc::now()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CorruptData, "{text}");
        }
    }

    #[test]
    fn test_one_bad_record_fails_the_document() {
        let mut records: Vec<StoredSample> =
            (0..3).map(|i| record(&format!("pad-{i}"), 0.1)).collect();
        records[1].channel_data.truncate(13);
        let text = to_transfer_text(&records, Utc::now()).unwrap();

        let err = from_transfer_text(&text, Utc::now()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_bad_base64_is_corrupt() {
        let text = r#"{"formatVersion":"2.0.0","exportedAt":"x","samples":[{"padId":"pad-0","label":"a","channelData":"@@@"}]}"#;
        assert!(matches!(
            from_transfer_text(text, Utc::now()),
            Err(CodecError::Base64(_))
        ));
    }

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(export_file_name(date), "musicpad-bank-2026-03-07.json");
    }
}
