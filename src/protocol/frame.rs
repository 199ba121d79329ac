//! Length-prefixed framing for log records
//!
//! Every record travels as a 4-byte big-endian length followed by exactly that
//! many bytes of JSON. A reader never looks at payload bytes before the whole
//! header and then the whole payload have arrived.

use crate::types::LogRecord;
use crate::{RelayError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Size of the length prefix in bytes
pub const HEADER_LEN: usize = 4;

/// Default upper bound on a single payload (16 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Codec turning a byte stream into records and back
#[derive(Debug, Clone)]
pub struct RecordCodec {
    max_frame_size: usize,
}

impl RecordCodec {
    /// Create a codec with the default frame limit
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    /// Create a codec rejecting payloads above `max_frame_size` bytes
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    fn check_len(&self, len: usize) -> Result<u32> {
        if len > self.max_frame_size {
            return Err(RelayError::FrameTooLarge {
                len,
                max: self.max_frame_size,
            });
        }
        u32::try_from(len).map_err(|_| RelayError::FrameTooLarge {
            len,
            max: u32::MAX as usize,
        })
    }
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new()
    }
}

fn peek_len(src: &[u8]) -> usize {
    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&src[..HEADER_LEN]);
    u32::from_be_bytes(header) as usize
}

impl Decoder for RecordCodec {
    type Item = LogRecord;
    type Error = RelayError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<LogRecord>> {
        if src.len() < HEADER_LEN {
            src.reserve(HEADER_LEN - src.len());
            return Ok(None);
        }

        let len = peek_len(src);
        // Reject before buffering the payload.
        self.check_len(len)?;

        let frame_len = HEADER_LEN + len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let payload = src.split_to(len);
        decode_payload(&payload).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<LogRecord>> {
        match self.decode(src)? {
            Some(record) => Ok(Some(record)),
            None if src.is_empty() => Ok(None),
            None => {
                let expected = if src.len() < HEADER_LEN {
                    HEADER_LEN
                } else {
                    HEADER_LEN + peek_len(src)
                };
                Err(RelayError::TruncatedFrame {
                    expected,
                    received: src.len(),
                })
            }
        }
    }
}

impl<'a> Encoder<&'a LogRecord> for RecordCodec {
    type Error = RelayError;

    fn encode(&mut self, record: &'a LogRecord, dst: &mut BytesMut) -> Result<()> {
        let payload = serde_json::to_vec(record)?;
        let len = self.check_len(payload.len())?;

        dst.reserve(HEADER_LEN + payload.len());
        dst.put_u32(len);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

/// Encode one record into a complete frame
pub fn encode_record(record: &LogRecord) -> Result<Bytes> {
    let mut buf = BytesMut::new();
    RecordCodec::new().encode(record, &mut buf)?;
    Ok(buf.freeze())
}

/// Deserialize a frame payload (without its header)
pub fn decode_payload(payload: &[u8]) -> Result<LogRecord> {
    Ok(serde_json::from_slice(payload)?)
}
