//! # lyskom-protocol
//!
//! Wire-level implementation of LysKOM Protocol A.
//!
//! This crate provides:
//! - Hollerith string framing (`<length>H<bytes>`)
//! - The whitespace-separated primitive grammar (integers, bit-fields,
//!   delimited lists, arrays, nine-field time tuples)
//! - Domain types with their exact wire representations
//! - The protocol call-number table and request argument encoding
//! - Codec errors and the server error taxonomy (codes 0-61)
//!
//! Everything here operates on `AsyncRead` streams, in-memory slices, or
//! `String` output buffers; socket ownership lives in `lyskom-client`.

pub mod error;
pub mod hollerith;
pub mod message;
pub mod types;
pub mod wire;

pub use error::{CodecError, ServerError};
pub use message::{CallNo, RequestArgs};

/// Default TCP port for a LysKOM server.
pub const DEFAULT_PORT: u16 = 4894;

/// Status byte introducing a successful response.
pub const STATUS_OK: u8 = b'=';

/// Status byte introducing an error response.
pub const STATUS_ERROR: u8 = b'%';

/// Upper bound on a single Hollerith payload. The length prefix is
/// authoritative, so without a cap a corrupt or hostile peer could make us
/// allocate arbitrary amounts of memory before the stream underruns.
pub const MAX_STRING_LEN: u64 = 16 * 1024 * 1024;
