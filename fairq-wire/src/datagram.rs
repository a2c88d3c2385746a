use std::time::Instant;

use bytes::{Bytes, BytesMut};

use crate::{Error, Format, Header, MAX_PAYLOAD_SIZE};

/// A datagram as seen by the router: the decoded header, the full encoded frame and the instant
/// it was received.
///
/// The frame is kept as-is so it can be forwarded without re-encoding. Datagrams are immutable
/// once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    header: Header,
    /// Header and payload, exactly as they go on the wire.
    frame: Bytes,
    /// When the datagram entered the router. Used for delay reporting only.
    received_at: Instant,
}

impl Datagram {
    /// Builds a datagram from a header and a payload, encoding the frame.
    pub fn new(header: Header, payload: impl AsRef<[u8]>) -> Result<Self, Error> {
        let payload = payload.as_ref();
        if payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge(payload.len()));
        }

        let mut frame = BytesMut::with_capacity(header.encoded_len() + payload.len());
        header.encode(&mut frame)?;
        frame.extend_from_slice(payload);

        Ok(Self { header, frame: frame.freeze(), received_at: Instant::now() })
    }

    /// Decodes a received frame.
    ///
    /// Payload bytes beyond [`MAX_PAYLOAD_SIZE`] are cut off.
    pub fn decode(mut frame: Bytes, format: Format) -> Result<Self, Error> {
        let header = Header::decode(&mut frame.clone(), format)?;
        frame.truncate(format.header_len() + MAX_PAYLOAD_SIZE);

        Ok(Self { header, frame, received_at: Instant::now() })
    }

    /// Returns the decoded header.
    #[inline]
    pub const fn header(&self) -> &Header {
        &self.header
    }

    /// Returns the flow ID.
    #[inline]
    pub const fn flow_id(&self) -> u32 {
        self.header.flow_id
    }

    /// Returns the declared weight. A weight of zero on the wire counts as one.
    #[inline]
    pub fn weight(&self) -> u32 {
        self.header.weight.max(1)
    }

    /// Returns the payload (the frame without its header).
    #[inline]
    pub fn payload(&self) -> Bytes {
        self.frame.slice(self.header.encoded_len()..)
    }

    /// Returns the encoded size in bytes, header included.
    #[inline]
    pub fn size(&self) -> usize {
        self.frame.len()
    }

    /// Returns the encoded frame.
    #[inline]
    pub const fn frame(&self) -> &Bytes {
        &self.frame
    }

    /// Consumes the datagram, returning the encoded frame.
    #[inline]
    pub fn into_frame(self) -> Bytes {
        self.frame
    }

    /// Returns the instant the datagram was received or created.
    #[inline]
    pub const fn received_at(&self) -> Instant {
        self.received_at
    }
}
