//! Wire protocol shared by the client and the collector

pub mod frame;

pub use frame::{decode_payload, encode_record, RecordCodec, DEFAULT_MAX_FRAME_SIZE, HEADER_LEN};
