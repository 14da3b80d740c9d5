//! epp-protocol: Wire format for EPP over TCP
//!
//! This crate defines the length-prefixed framing used on every EPP
//! connection, the few command payloads the client issues itself, and the
//! interpretation of greetings and result codes.

pub mod codec;
pub mod command;
pub mod error;
pub mod frame;
pub mod response;
pub mod trid;

pub use codec::FrameCodec;
pub use command::LoginOptions;
pub use error::ProtocolError;
pub use frame::{
    decode_header, encode_frame, read_frame, read_payload, write_frame, HEADER_SIZE,
    MAX_PAYLOAD_SIZE,
};
pub use response::{classify, Classification, CommandResult, Greeting, ResultCode, ResultPolicy};
pub use trid::{TransactionId, TransactionIdGenerator};
