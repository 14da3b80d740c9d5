//! Protocol error types

use thiserror::Error;

/// Errors that can occur while framing or interpreting EPP messages
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Fewer than four header bytes were supplied
    #[error("Short frame header: got {got} of 4 bytes")]
    ShortHeader { got: usize },

    /// Declared total length does not cover the header itself
    #[error("Invalid frame length {declared}: must be at least 4")]
    InvalidLength { declared: u32 },

    /// Payload exceeds the configured maximum
    #[error("Payload too large: {size} bytes exceeds maximum of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    /// Peer closed the stream before a full frame arrived
    #[error("Connection closed: expected {expected} bytes, got {received}")]
    ConnectionClosed { expected: usize, received: usize },

    /// Response carries no `<result>` element
    #[error("Response has no result element")]
    MissingResult,

    /// `<result code>` is not a number
    #[error("Invalid result code: {0:?}")]
    InvalidResultCode(String),

    /// Malformed XML
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Bad entity or character reference in text
    #[error("XML escape error: {0}")]
    Escape(#[from] quick_xml::escape::EscapeError),

    /// Payload is not UTF-8
    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether the peer went away mid-frame (or before a frame started)
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, ProtocolError::ConnectionClosed { .. })
    }

    /// Whether this is a malformed-envelope error
    pub fn is_framing(&self) -> bool {
        matches!(
            self,
            ProtocolError::ShortHeader { .. }
                | ProtocolError::InvalidLength { .. }
                | ProtocolError::PayloadTooLarge { .. }
        )
    }
}
