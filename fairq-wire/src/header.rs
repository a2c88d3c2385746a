use std::net::Ipv4Addr;

use bytes::{Buf, BufMut};

use crate::{Error, EXTENDED_HEADER_LEN, MINIMAL_HEADER_LEN};

/// The header layout on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Format {
    /// 16 bytes, 16-bit weight and flow id, no sequence number.
    #[default]
    Minimal,
    /// 24 bytes, 32-bit weight and flow id, followed by a 32-bit sequence number.
    Extended,
}

impl Format {
    /// Returns the length of a header in this format.
    #[inline]
    pub const fn header_len(self) -> usize {
        match self {
            Self::Minimal => MINIMAL_HEADER_LEN,
            Self::Extended => EXTENDED_HEADER_LEN,
        }
    }
}

/// The project header carried in front of every datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    /// Source IPv4 address.
    pub src_addr: Ipv4Addr,
    /// Destination IPv4 address.
    pub dst_addr: Ipv4Addr,
    /// Source port.
    pub src_port: u16,
    /// Destination port.
    pub dst_port: u16,
    /// The fairness share declared by the sender.
    pub weight: u32,
    /// The flow this datagram belongs to.
    pub flow_id: u32,
    /// Sequence number. Only present in the extended format.
    pub seq: Option<u32>,
}

impl Header {
    /// Creates a minimal header for the given flow with unspecified addressing.
    pub const fn new(flow_id: u32, weight: u32) -> Self {
        Self {
            src_addr: Ipv4Addr::UNSPECIFIED,
            dst_addr: Ipv4Addr::UNSPECIFIED,
            src_port: 0,
            dst_port: 0,
            weight,
            flow_id,
            seq: None,
        }
    }

    /// Sets the source address and port.
    pub const fn with_source(mut self, addr: Ipv4Addr, port: u16) -> Self {
        self.src_addr = addr;
        self.src_port = port;
        self
    }

    /// Sets the destination address and port.
    pub const fn with_destination(mut self, addr: Ipv4Addr, port: u16) -> Self {
        self.dst_addr = addr;
        self.dst_port = port;
        self
    }

    /// Attaches a sequence number, which switches the header to the extended format.
    pub const fn with_seq(mut self, seq: u32) -> Self {
        self.seq = Some(seq);
        self
    }

    /// Returns the format this header is encoded with.
    #[inline]
    pub const fn format(&self) -> Format {
        match self.seq {
            Some(_) => Format::Extended,
            None => Format::Minimal,
        }
    }

    /// Returns the length of the encoded header in bytes.
    #[inline]
    pub const fn encoded_len(&self) -> usize {
        self.format().header_len()
    }

    /// Decodes a header in the given format from the front of `src`, advancing it.
    ///
    /// Fails with [`Error::MalformedHeader`] if `src` holds fewer bytes than the header length.
    pub fn decode(src: &mut impl Buf, format: Format) -> Result<Self, Error> {
        let expected = format.header_len();
        if src.remaining() < expected {
            return Err(Error::MalformedHeader { expected, actual: src.remaining() });
        }

        let src_addr = Ipv4Addr::from(src.get_u32());
        let dst_addr = Ipv4Addr::from(src.get_u32());
        let src_port = src.get_u16();
        let dst_port = src.get_u16();

        let (weight, flow_id, seq) = match format {
            Format::Minimal => (src.get_u16() as u32, src.get_u16() as u32, None),
            Format::Extended => (src.get_u32(), src.get_u32(), Some(src.get_u32())),
        };

        Ok(Self { src_addr, dst_addr, src_port, dst_port, weight, flow_id, seq })
    }

    /// Encodes the header into `dst`.
    ///
    /// In the minimal format the weight and flow id must fit in 16 bits, otherwise this fails
    /// with [`Error::FieldOverflow`] and nothing is written.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<(), Error> {
        let format = self.format();

        if format == Format::Minimal {
            for (field, value) in [("weight", self.weight), ("flow_id", self.flow_id)] {
                if value > u16::MAX as u32 {
                    return Err(Error::FieldOverflow { field, value, format });
                }
            }
        }

        dst.put_u32(self.src_addr.into());
        dst.put_u32(self.dst_addr.into());
        dst.put_u16(self.src_port);
        dst.put_u16(self.dst_port);

        match self.seq {
            None => {
                dst.put_u16(self.weight as u16);
                dst.put_u16(self.flow_id as u16);
            }
            Some(seq) => {
                dst.put_u32(self.weight);
                dst.put_u32(self.flow_id);
                dst.put_u32(seq);
            }
        }

        Ok(())
    }
}
