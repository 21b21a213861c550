use crate::blob::Blob;
use crate::error::{WireError, WireResult};
use crate::packet::{Packet, MAGIC_WORDS};

/// Serializes one packet at a time into the wire framing:
/// `magic(8) | type(4, BE) | sender_len(4, BE) | sender | receiver_len(4, BE)
/// | receiver | content_len(4, BE) | body`.
///
/// Internally this holds exactly one framed packet's worth of bytes.
/// [`Serializer::send_pkt`] fails with [`WireError::SerializeCtxBusy`] if
/// the previous packet has not been fully drained yet via
/// [`Serializer::receive_chunk`] — the caller is expected to keep calling
/// `receive_chunk` until it returns 0 before handing over the next packet.
#[derive(Debug, Default)]
pub struct Serializer {
    buf: Blob,
    fulfilled: bool,
    read_offset: usize,
}

impl Serializer {
    pub fn new() -> Self {
        Self { buf: Blob::with_capacity(256), fulfilled: false, read_offset: 0 }
    }

    pub fn is_ready_to_send_pkt(&self) -> bool {
        !self.fulfilled
    }

    pub fn is_ready_to_receive_chunk(&self) -> bool {
        self.fulfilled
    }

    /// Frames `pkt` into the internal buffer. The whole frame is assembled
    /// atomically; there is no partially-written state observable from
    /// outside.
    pub fn send_pkt(&mut self, pkt: &Packet) -> WireResult<()> {
        if self.fulfilled {
            return Err(WireError::SerializeCtxBusy);
        }

        self.buf.clear();
        self.buf.send_chunk(&MAGIC_WORDS);
        self.buf.send_chunk(&(pkt.packet_type() as u32).to_be_bytes());
        self.buf.send_chunk(&(pkt.sender().len() as u32).to_be_bytes());
        self.buf.send_chunk(pkt.sender());
        self.buf.send_chunk(&(pkt.receiver().len() as u32).to_be_bytes());
        self.buf.send_chunk(pkt.receiver());
        self.buf.send_chunk(&(pkt.body_len() as u32).to_be_bytes());
        self.buf.send_chunk(pkt.body());

        self.fulfilled = true;
        self.read_offset = 0;
        Ok(())
    }

    /// Copies up to `dst.len()` bytes of the framed packet into `dst`.
    /// Returns 0 once the whole frame has been drained, at which point the
    /// serializer becomes ready to accept the next packet.
    pub fn receive_chunk(&mut self, dst: &mut [u8]) -> WireResult<usize> {
        if !self.fulfilled {
            return Err(WireError::NotReadyToExtract);
        }

        let n = self.buf.receive_chunk(dst, self.read_offset);
        self.read_offset += n;

        if self.read_offset >= self.buf.size() {
            self.fulfilled = false;
            self.read_offset = 0;
            self.buf.clear();
        }

        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::{HeaderField, PacketType};

    fn sample_packet() -> Packet {
        let mut pkt = Packet::new(PacketType::Msg);
        pkt.header_set(HeaderField::Sender, b"alice").unwrap();
        pkt.header_set(HeaderField::Receiver, b"bob").unwrap();
        pkt.body_send_chunk(b"hi there").unwrap();
        pkt
    }

    #[test]
    fn framed_bytes_match_wire_layout() {
        let mut ser = Serializer::new();
        ser.send_pkt(&sample_packet()).unwrap();

        let mut out = Vec::new();
        let mut chunk = [0u8; 4];
        loop {
            let n = ser.receive_chunk(&mut chunk).unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&chunk[..n]);
        }

        assert_eq!(&out[0..8], &MAGIC_WORDS);
        assert_eq!(u32::from_be_bytes(out[8..12].try_into().unwrap()), 0);
        assert_eq!(u32::from_be_bytes(out[12..16].try_into().unwrap()), 5);
        assert_eq!(&out[16..21], b"alice");
        assert_eq!(u32::from_be_bytes(out[21..25].try_into().unwrap()), 3);
        assert_eq!(&out[25..28], b"bob");
        assert_eq!(u32::from_be_bytes(out[28..32].try_into().unwrap()), 8);
        assert_eq!(&out[32..40], b"hi there");
    }

    #[test]
    fn busy_until_fully_drained() {
        let mut ser = Serializer::new();
        ser.send_pkt(&sample_packet()).unwrap();
        assert_eq!(ser.send_pkt(&sample_packet()), Err(WireError::SerializeCtxBusy));

        let mut sink = vec![0u8; 1024];
        ser.receive_chunk(&mut sink).unwrap();
        assert!(ser.is_ready_to_send_pkt());
        ser.send_pkt(&sample_packet()).unwrap();
    }

    #[test]
    fn receive_chunk_before_send_pkt_errors() {
        let mut ser = Serializer::new();
        let mut sink = [0u8; 4];
        assert_eq!(ser.receive_chunk(&mut sink), Err(WireError::NotReadyToExtract));
    }
}
