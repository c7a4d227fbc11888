//! Time-sliced encoding of the combined media stream

pub mod backend;
pub mod stream;
pub mod types;

pub use backend::{EncoderBackend, EncoderFactory, MediaStream};
pub use stream::{negotiate_mime_type, EncoderReport, StreamEncoder};
pub use types::{EncodedChunk, EncoderOptions, EncoderState, MimeType, DEFAULT_MIME_TYPE};
