use crate::blob::Blob;
use crate::error::{WireError, WireResult};

/// Magic word prefix every framed packet begins with on the wire.
pub const MAGIC_WORDS: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x01, 0x02, 0x03, 0x04];

/// Header fields may not exceed this many bytes (sender and receiver alike).
pub const MAX_HEADER_VALUE_SIZE: usize = 1 << 10;

/// A packet body may not exceed this many bytes.
pub const MAX_BODY_SIZE: usize = 1 << 20;

/// The fully framed size of a packet (header + body) may not exceed this.
pub const MAX_PACKET_SIZE: usize = 1 << 21;

/// The only packet type currently defined on the wire. Reserved for future
/// extension; unrecognized values are rejected during parsing rather than
/// silently accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum PacketType {
    Msg = 0,
}

impl TryFrom<u32> for PacketType {
    type Error = WireError;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PacketType::Msg),
            _ => Err(WireError::NonSupportedMsgType),
        }
    }
}

/// Which header field an operation addresses. `ContentLength` is derived
/// from the body and can only be read, never written directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderField {
    Sender,
    Receiver,
    ContentLength,
}

/// Value returned by a header read. Sender/receiver read back as bytes;
/// content length reads back as the body's current size.
#[derive(Debug, Clone, Copy)]
pub enum HeaderValue<'a> {
    Bytes(&'a [u8]),
    Length(u32),
}

/// A single relay message: a type tag, sender/receiver identifiers, and a
/// body. Sender and receiver are plain byte strings (usernames in practice)
/// rather than `str` so that header parsing never has to reason about UTF-8
/// validity of attacker-controlled bytes.
#[derive(Debug, Clone)]
pub struct Packet {
    ty: PacketType,
    sender: Vec<u8>,
    receiver: Vec<u8>,
    body: Blob,
}

impl Default for Packet {
    fn default() -> Self {
        Self::new(PacketType::Msg)
    }
}

impl Packet {
    pub fn new(ty: PacketType) -> Self {
        Self { ty, sender: Vec::new(), receiver: Vec::new(), body: Blob::with_capacity(0) }
    }

    pub fn packet_type(&self) -> PacketType {
        self.ty
    }

    pub fn set_type(&mut self, ty: PacketType) {
        self.ty = ty;
    }

    /// Resets the packet to an empty `Msg` with zeroed header fields and
    /// body, so it can be reused for the next parse cycle without a fresh
    /// allocation.
    pub fn reset(&mut self) {
        self.ty = PacketType::Msg;
        self.sender.clear();
        self.receiver.clear();
        self.body.clear();
    }

    /// Sets the sender or receiver header field. `ContentLength` is derived
    /// and cannot be set this way.
    pub fn header_set(&mut self, field: HeaderField, value: &[u8]) -> WireResult<()> {
        if value.len() > MAX_HEADER_VALUE_SIZE {
            return Err(WireError::SizeTooLarge);
        }
        match field {
            HeaderField::Sender => {
                self.sender.clear();
                self.sender.extend_from_slice(value);
                Ok(())
            }
            HeaderField::Receiver => {
                self.receiver.clear();
                self.receiver.extend_from_slice(value);
                Ok(())
            }
            HeaderField::ContentLength => Err(WireError::NonSupportedField),
        }
    }

    pub fn header_get(&self, field: HeaderField) -> HeaderValue<'_> {
        match field {
            HeaderField::Sender => HeaderValue::Bytes(&self.sender),
            HeaderField::Receiver => HeaderValue::Bytes(&self.receiver),
            HeaderField::ContentLength => HeaderValue::Length(self.body.size() as u32),
        }
    }

    pub fn sender(&self) -> &[u8] {
        &self.sender
    }

    pub fn receiver(&self) -> &[u8] {
        &self.receiver
    }

    pub fn body(&self) -> &[u8] {
        self.body.as_slice()
    }

    pub fn body_len(&self) -> usize {
        self.body.size()
    }

    /// Appends `buf` to the body. Fails once the body would exceed
    /// `MAX_BODY_SIZE`; the write is rejected in full rather than truncated.
    pub fn body_send_chunk(&mut self, buf: &[u8]) -> WireResult<()> {
        if self.body.size() + buf.len() > MAX_BODY_SIZE {
            return Err(WireError::BodyTooLarge);
        }
        self.body.send_chunk(buf);
        Ok(())
    }

    pub fn body_receive_chunk(&self, dst: &mut [u8], src_offset: usize) -> usize {
        self.body.receive_chunk(dst, src_offset)
    }
}
