//! Lossless byte encoding of sample buffers.
//!
//! Layout, all little-endian:
//!
//! | offset | size                           | field           |
//! |--------|--------------------------------|-----------------|
//! | 0      | 4                              | `channel_count` |
//! | 4      | 4                              | `frame_count`   |
//! | 8      | 4                              | `sample_rate`   |
//! | 12     | 4 * frame_count * channel_count | channel blocks  |
//!
//! Channel blocks are written in channel order, each holding `frame_count` `f32` values. Floats
//! are copied by bit pattern, so NaN payloads, signed zeros and subnormals survive a round trip.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::audio_engine::errors::ErrorKind;
use crate::messages::SampleBuffer;

/// Size of the fixed header in bytes.
pub const HEADER_LEN: usize = 12;

const F32_LEN: usize = std::mem::size_of::<f32>();

/// Errors produced while encoding, decoding or transferring sample data.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("sample data is {len} bytes, shorter than the {HEADER_LEN}-byte header")]
    Truncated { len: usize },

    #[error("sample body is {found} bytes, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("sample data declares zero channels")]
    ZeroChannels,

    #[error("sample data declares a zero sample rate")]
    ZeroSampleRate,

    #[error("sample buffer is too large to encode ({channels} channels, {frames} frames)")]
    Oversized { channels: usize, frames: usize },

    #[error("invalid base64 channel data: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("malformed bank document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported bank format version `{found}`")]
    IncompatibleVersion { found: String },
}

impl CodecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CodecError::IncompatibleVersion { .. } => ErrorKind::IncompatibleFormat,
            _ => ErrorKind::CorruptData,
        }
    }
}

/// Serializes a buffer into the canonical byte layout.
///
/// # Errors
///
/// Returns [`CodecError::Oversized`] when the channel or frame count does not fit in a `u32`.
pub fn encode(buffer: &SampleBuffer) -> Result<Vec<u8>, CodecError> {
    let channels = buffer.channel_count();
    let frames = buffer.frame_count();
    let oversized = || CodecError::Oversized { channels, frames };

    let channel_count = u32::try_from(channels).map_err(|_| oversized())?;
    let frame_count = u32::try_from(frames).map_err(|_| oversized())?;
    let body_len = channels
        .checked_mul(frames)
        .and_then(|n| n.checked_mul(F32_LEN))
        .ok_or_else(oversized)?;

    let mut out = Vec::with_capacity(HEADER_LEN + body_len);
    out.extend_from_slice(&channel_count.to_le_bytes());
    out.extend_from_slice(&frame_count.to_le_bytes());
    out.extend_from_slice(&buffer.sample_rate().to_le_bytes());
    for channel in buffer.channels() {
        for sample in channel {
            out.extend_from_slice(&sample.to_bits().to_le_bytes());
        }
    }
    Ok(out)
}

/// Rebuilds a buffer from bytes written by [`encode`].
///
/// # Errors
///
/// Fails with a corrupt-data error when the header is short, a header field is zero, or the
/// body length disagrees with the header.
pub fn decode(bytes: &[u8]) -> Result<SampleBuffer, CodecError> {
    let header = read_header(bytes)?;

    let block_len = header.frame_count * F32_LEN;
    let channels: Vec<Vec<f32>> = (0..header.channel_count)
        .map(|index| {
            let start = HEADER_LEN + index * block_len;
            bytes[start..start + block_len]
                .chunks_exact(F32_LEN)
                .map(|raw| f32::from_bits(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])))
                .collect()
        })
        .collect();

    SampleBuffer::from_channels(header.sample_rate, channels).map_err(|_| {
        CodecError::LengthMismatch {
            expected: header.body_len,
            found: bytes.len() - HEADER_LEN,
        }
    })
}

/// Header fields of an encoded buffer, validated against the data length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub channel_count: usize,
    pub frame_count: usize,
    pub sample_rate: u32,
    body_len: usize,
}

/// Parses and validates the header without decoding the body.
pub fn read_header(bytes: &[u8]) -> Result<Header, CodecError> {
    if bytes.len() < HEADER_LEN {
        return Err(CodecError::Truncated { len: bytes.len() });
    }

    let field = |offset: usize| {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    };
    let channel_count = field(0) as usize;
    let frame_count = field(4) as usize;
    let sample_rate = field(8);

    if channel_count == 0 {
        return Err(CodecError::ZeroChannels);
    }
    if sample_rate == 0 {
        return Err(CodecError::ZeroSampleRate);
    }

    let found = bytes.len() - HEADER_LEN;
    let body_len = channel_count
        .checked_mul(frame_count)
        .and_then(|n| n.checked_mul(F32_LEN))
        .ok_or(CodecError::LengthMismatch {
            expected: usize::MAX,
            found,
        })?;
    if body_len != found {
        return Err(CodecError::LengthMismatch {
            expected: body_len,
            found,
        });
    }

    Ok(Header {
        channel_count,
        frame_count,
        sample_rate,
        body_len,
    })
}

/// A persisted sample record, one per pad id.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSample {
    pub pad_id: String,
    pub label: String,
    pub sample_rate: u32,
    pub channel_count: usize,
    pub frame_count: usize,
    /// Bytes in the layout written by [`encode`].
    pub channel_data: Vec<u8>,
    pub saved_at: DateTime<Utc>,
    /// Always `channel_data.len()`.
    pub byte_size: usize,
}

impl StoredSample {
    /// Encodes `buffer` into a record for `pad_id`.
    pub fn from_buffer(
        pad_id: &str,
        label: &str,
        buffer: &SampleBuffer,
        saved_at: DateTime<Utc>,
    ) -> Result<Self, CodecError> {
        let channel_data = encode(buffer)?;
        Ok(Self {
            pad_id: pad_id.to_string(),
            label: label.to_string(),
            sample_rate: buffer.sample_rate(),
            channel_count: buffer.channel_count(),
            frame_count: buffer.frame_count(),
            byte_size: channel_data.len(),
            channel_data,
            saved_at,
        })
    }

    /// Builds a record from already-encoded channel data, taking the shape from its header.
    pub fn from_channel_data(
        pad_id: &str,
        label: &str,
        channel_data: Vec<u8>,
        saved_at: DateTime<Utc>,
    ) -> Result<Self, CodecError> {
        let header = read_header(&channel_data)?;
        Ok(Self {
            pad_id: pad_id.to_string(),
            label: label.to_string(),
            sample_rate: header.sample_rate,
            channel_count: header.channel_count,
            frame_count: header.frame_count,
            byte_size: channel_data.len(),
            channel_data,
            saved_at,
        })
    }

    /// Decodes the record's channel data back into a buffer.
    pub fn decode_buffer(&self) -> Result<SampleBuffer, CodecError> {
        decode(&self.channel_data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(buffer: &SampleBuffer) -> SampleBuffer {
        decode(&encode(buffer).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_layout() {
        let buffer = SampleBuffer::from_channels(48_000, vec![vec![1.0, 2.0], vec![3.0, 4.0]])
            .unwrap();
        let bytes = encode(&buffer).unwrap();

        assert_eq!(bytes.len(), HEADER_LEN + 16);
        assert_eq!(&bytes[0..4], &2u32.to_le_bytes());
        assert_eq!(&bytes[4..8], &2u32.to_le_bytes());
        assert_eq!(&bytes[8..12], &48_000u32.to_le_bytes());
        // Channel 0 block first, then channel 1.
        assert_eq!(&bytes[12..16], &1.0f32.to_le_bytes());
        assert_eq!(&bytes[16..20], &2.0f32.to_le_bytes());
        assert_eq!(&bytes[20..24], &3.0f32.to_le_bytes());
    }

    #[test]
    fn test_roundtrip_preserves_special_floats() {
        let quiet_nan = f32::from_bits(0x7fc0_0001);
        let signalling_nan = f32::from_bits(0x7f80_0001);
        let subnormal = f32::from_bits(0x0000_0001);
        let buffer = SampleBuffer::from_channels(
            44_100,
            vec![
                vec![quiet_nan, -0.0, subnormal, f32::INFINITY],
                vec![signalling_nan, 0.0, -subnormal, 1.5],
            ],
        )
        .unwrap();

        let decoded = roundtrip(&buffer);
        assert!(decoded.bit_eq(&buffer));
        assert_eq!(decoded.channel(0)[0].to_bits(), 0x7fc0_0001);
        assert_eq!(decoded.channel(1)[0].to_bits(), 0x7f80_0001);
        assert_eq!(decoded.channel(0)[1].to_bits(), (-0.0f32).to_bits());
    }

    #[test]
    fn test_zero_frame_buffer_roundtrips() {
        let buffer = SampleBuffer::silent(3, 22_050, 0).unwrap();
        let decoded = roundtrip(&buffer);
        assert_eq!(decoded.channel_count(), 3);
        assert_eq!(decoded.frame_count(), 0);
        assert_eq!(decoded.sample_rate(), 22_050);
    }

    #[test]
    fn test_decode_rejects_short_header() {
        assert!(matches!(
            decode(&[0u8; 11]),
            Err(CodecError::Truncated { len: 11 })
        ));
    }

    #[test]
    fn test_decode_rejects_zero_fields() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&44_100u32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(CodecError::ZeroChannels)));

        let mut bytes = Vec::new();
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(decode(&bytes), Err(CodecError::ZeroSampleRate)));
    }

    #[test]
    fn test_decode_rejects_body_length_mismatch() {
        let buffer = SampleBuffer::silent(2, 44_100, 4).unwrap();
        let mut bytes = encode(&buffer).unwrap();
        bytes.pop();

        let err = decode(&bytes).unwrap_err();
        assert!(matches!(
            err,
            CodecError::LengthMismatch {
                expected: 32,
                found: 31
            }
        ));
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_stored_sample_records_shape() {
        let buffer = SampleBuffer::silent(2, 44_100, 10).unwrap();
        let record = StoredSample::from_buffer("pad-3", "kick", &buffer, Utc::now()).unwrap();

        assert_eq!(record.pad_id, "pad-3");
        assert_eq!(record.channel_count, 2);
        assert_eq!(record.frame_count, 10);
        assert_eq!(record.sample_rate, 44_100);
        assert_eq!(record.byte_size, record.channel_data.len());
        assert_eq!(record.byte_size, HEADER_LEN + 80);
        assert!(record.decode_buffer().unwrap().bit_eq(&buffer));
    }

    #[test]
    fn test_version_mismatch_is_incompatible_format() {
        let err = CodecError::IncompatibleVersion {
            found: "1.0.0".into(),
        };
        assert_eq!(err.kind(), ErrorKind::IncompatibleFormat);
    }
}
