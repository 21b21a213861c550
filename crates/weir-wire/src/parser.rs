use std::fmt;

use crate::error::{WireError, WireResult};
use crate::packet::{
    HeaderField, Packet, PacketType, MAGIC_WORDS, MAX_BODY_SIZE, MAX_HEADER_VALUE_SIZE,
    MAX_PACKET_SIZE,
};
use crate::ringbuf::RingBuffer;

/// Where the incremental parser is in the middle of decoding one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    ExpectMagic,
    ExpectType,
    ExpectSenderLen,
    ExpectSender,
    ExpectReceiverLen,
    ExpectReceiver,
    ExpectContentLen,
    ExpectBody,
}

impl ParseState {
    pub fn as_str(self) -> &'static str {
        match self {
            ParseState::ExpectMagic => "ExpectMagic",
            ParseState::ExpectType => "ExpectType",
            ParseState::ExpectSenderLen => "ExpectSenderLen",
            ParseState::ExpectSender => "ExpectSender",
            ParseState::ExpectReceiverLen => "ExpectReceiverLen",
            ParseState::ExpectReceiver => "ExpectReceiver",
            ParseState::ExpectContentLen => "ExpectContentLen",
            ParseState::ExpectBody => "ExpectBody",
        }
    }
}

impl fmt::Display for ParseState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a [`Parser::send_chunk`] call that did not hit a framing
/// error. `accepted` is how many bytes of the input were absorbed into the
/// parser's internal ring buffer (capped by its remaining capacity, which
/// for well-behaved connections never actually binds). When `complete` is
/// `false`, `need_more` is a hint (not a guarantee) of how many additional
/// bytes would let the state machine make further progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendChunkReport {
    pub accepted: usize,
    pub need_more: usize,
    pub complete: bool,
}

/// Incrementally decodes a stream of bytes into [`Packet`]s.
///
/// Bytes are fed in via [`Parser::send_chunk`] as they arrive off the wire,
/// in whatever sizes happen to be convenient for the caller (there is no
/// requirement that a call boundary line up with a field boundary). Once a
/// call reports `complete: true`, [`Parser::receive_pkt`] extracts the
/// finished packet; no further bytes may be fed in until that happens.
pub struct Parser {
    ring: RingBuffer,
    state: ParseState,
    in_progress: Packet,
    sender_len: usize,
    receiver_len: usize,
    content_len_remaining: usize,
    parsed: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}

impl Parser {
    pub fn new() -> Self {
        Self {
            ring: RingBuffer::with_capacity(MAX_PACKET_SIZE),
            state: ParseState::ExpectMagic,
            in_progress: Packet::new(PacketType::Msg),
            sender_len: 0,
            receiver_len: 0,
            content_len_remaining: 0,
            parsed: false,
        }
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    pub fn is_ready_to_send_chunk(&self) -> bool {
        !self.parsed
    }

    pub fn is_ready_to_extract_packet(&self) -> bool {
        self.parsed
    }

    /// Feeds `buf` into the parser and advances the state machine as far as
    /// the buffered bytes allow.
    pub fn send_chunk(&mut self, buf: &[u8]) -> WireResult<SendChunkReport> {
        if self.parsed {
            return Err(WireError::ExtractParsedPacketFirst);
        }
        if buf.is_empty() && self.ring.is_empty() {
            return Err(WireError::NoDataToParse);
        }

        let accepted = buf.len().min(self.ring.remaining_capacity());
        self.ring.send_chunk(&buf[..accepted]);

        loop {
            match self.state {
                ParseState::ExpectMagic => {
                    if self.ring.size() < MAGIC_WORDS.len() {
                        return Ok(self.need_more_report(accepted, MAGIC_WORDS.len()));
                    }
                    let mut magic = [0u8; 8];
                    self.ring.receive_chunk(&mut magic);
                    if magic != MAGIC_WORDS {
                        return Err(WireError::MagicWordsMisMatch);
                    }
                    self.state = ParseState::ExpectType;
                }
                ParseState::ExpectType => {
                    if self.ring.size() < 4 {
                        return Ok(self.need_more_report(accepted, 4));
                    }
                    let ty = PacketType::try_from(self.read_u32())?;
                    self.in_progress.set_type(ty);
                    self.state = ParseState::ExpectSenderLen;
                }
                ParseState::ExpectSenderLen => {
                    if self.ring.size() < 4 {
                        return Ok(self.need_more_report(accepted, 4));
                    }
                    let len = self.read_u32() as usize;
                    if len > MAX_HEADER_VALUE_SIZE {
                        return Err(WireError::InvalidHeaderValue);
                    }
                    self.sender_len = len;
                    self.state = ParseState::ExpectSender;
                }
                ParseState::ExpectSender => {
                    if self.ring.size() < self.sender_len {
                        return Ok(self.need_more_report(accepted, self.sender_len));
                    }
                    let mut value = vec![0u8; self.sender_len];
                    self.ring.receive_chunk(&mut value);
                    self.in_progress.header_set(HeaderField::Sender, &value)?;
                    self.state = ParseState::ExpectReceiverLen;
                }
                ParseState::ExpectReceiverLen => {
                    if self.ring.size() < 4 {
                        return Ok(self.need_more_report(accepted, 4));
                    }
                    let len = self.read_u32() as usize;
                    if len > MAX_HEADER_VALUE_SIZE {
                        return Err(WireError::InvalidHeaderValue);
                    }
                    self.receiver_len = len;
                    self.state = ParseState::ExpectReceiver;
                }
                ParseState::ExpectReceiver => {
                    if self.ring.size() < self.receiver_len {
                        return Ok(self.need_more_report(accepted, self.receiver_len));
                    }
                    let mut value = vec![0u8; self.receiver_len];
                    self.ring.receive_chunk(&mut value);
                    self.in_progress.header_set(HeaderField::Receiver, &value)?;
                    self.state = ParseState::ExpectContentLen;
                }
                ParseState::ExpectContentLen => {
                    if self.ring.size() < 4 {
                        return Ok(self.need_more_report(accepted, 4));
                    }
                    let len = self.read_u32() as usize;
                    if len > MAX_BODY_SIZE {
                        return Err(WireError::BodyTooLarge);
                    }
                    self.content_len_remaining = len;
                    self.state = ParseState::ExpectBody;
                }
                ParseState::ExpectBody => {
                    if self.content_len_remaining == 0 {
                        self.parsed = true;
                        self.state = ParseState::ExpectMagic;
                        return Ok(SendChunkReport { accepted, need_more: 0, complete: true });
                    }
                    if self.ring.is_empty() {
                        let need_more = self.content_len_remaining.min(self.ring.capacity());
                        return Ok(SendChunkReport { accepted, need_more, complete: false });
                    }
                    let take = self.content_len_remaining.min(self.ring.size());
                    let mut chunk = vec![0u8; take];
                    self.ring.receive_chunk(&mut chunk);
                    self.in_progress.body_send_chunk(&chunk)?;
                    self.content_len_remaining -= take;
                }
            }
        }
    }

    fn need_more_report(&self, accepted: usize, field_size: usize) -> SendChunkReport {
        SendChunkReport { accepted, need_more: field_size - self.ring.size(), complete: false }
    }

    /// Reads a big-endian `u32` out of the ring buffer. Callers must have
    /// already checked `ring.size() >= 4`.
    fn read_u32(&mut self) -> u32 {
        let mut buf = [0u8; 4];
        self.ring.receive_chunk(&mut buf);
        u32::from_be_bytes(buf)
    }

    /// Extracts the packet assembled by the most recent `send_chunk` that
    /// reported `complete: true`.
    pub fn receive_pkt(&mut self) -> WireResult<Packet> {
        if !self.parsed {
            return Err(WireError::ParsingIsIncomplete);
        }
        let pkt = std::mem::replace(&mut self.in_progress, Packet::new(PacketType::Msg));
        self.parsed = false;
        Ok(pkt)
    }
}
