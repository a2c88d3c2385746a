//! Wire format for datagrams routed by fairq.
//!
//! Every datagram starts with a fixed-size project header in network byte order, followed by
//! the payload. Two header layouts exist:
//!
//! ```text
//! Minimal (16 bytes):
//! | src ip (4) | dst ip (4) | src port (2) | dst port (2) | weight (2) | flow id (2) |
//!
//! Extended (24 bytes):
//! | src ip (4) | dst ip (4) | src port (2) | dst port (2) | weight (4) | flow id (4) | seq (4) |
//! ```
//!
//! The extended layout carries a sequence number used by senders and receivers for delay
//! measurement. The scheduler only looks at the flow id, the weight and the total length.
#![doc(issue_tracker_base_url = "https://github.com/fairq/fairq/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

use thiserror::Error;

mod datagram;
pub use datagram::Datagram;

mod header;
pub use header::{Format, Header};

/// Length of the minimal header in bytes.
pub const MINIMAL_HEADER_LEN: usize = 16;

/// Length of the extended header in bytes.
pub const EXTENDED_HEADER_LEN: usize = 24;

/// The maximum payload carried by a single datagram.
pub const MAX_PAYLOAD_SIZE: usize = 1400;

/// The largest encoded datagram (extended header plus a full payload).
pub const MAX_DATAGRAM_SIZE: usize = EXTENDED_HEADER_LEN + MAX_PAYLOAD_SIZE;

/// Errors returned by the codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The frame is shorter than the header.
    #[error("Malformed header: expected at least {expected} bytes, got {actual}")]
    MalformedHeader { expected: usize, actual: usize },
    /// A header field does not fit the format's field width.
    #[error("Field {field} = {value} does not fit in the {format:?} header")]
    FieldOverflow { field: &'static str, value: u32, format: Format },
    /// The payload exceeds [`MAX_PAYLOAD_SIZE`].
    #[error("Payload too large: {0} bytes (max {MAX_PAYLOAD_SIZE})")]
    PayloadTooLarge(usize),
}
