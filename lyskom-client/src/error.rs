//! Client error types.

use lyskom_protocol::{CodecError, ServerError};
use thiserror::Error;

/// Errors surfaced by the engine and the typed operations.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("server error: {0}")]
    Server(#[from] ServerError),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connect timeout")]
    Timeout,

    #[error("response stream desynchronized: {0}")]
    Desync(String),

    #[error("response for unknown request {0}")]
    UnknownRequest(u32),
}

impl ClientError {
    /// True when the failure poisons the whole stream rather than one call.
    /// After a stream-fatal error the read cursor can no longer be trusted
    /// to sit on a frame boundary and the engine stops dispatching.
    pub fn is_stream_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_)
                | ClientError::ConnectionClosed
                | ClientError::Desync(_)
                | ClientError::UnknownRequest(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatality_classification() {
        assert!(ClientError::UnknownRequest(9).is_stream_fatal());
        assert!(ClientError::Desync("bad status byte".into()).is_stream_fatal());
        assert!(ClientError::ConnectionClosed.is_stream_fatal());
        assert!(!ClientError::Server(ServerError::NotImplemented).is_stream_fatal());
        assert!(!ClientError::NotConnected.is_stream_fatal());
    }
}
