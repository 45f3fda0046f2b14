mod error;
mod value;

pub use error::{KeelError, KeelResult};
pub use value::KeelValue;

/// A raw entry as stored by a backend: both halves are plain bytes.
pub type RawEntry = (bytes::Bytes, bytes::Bytes);
