use thiserror::Error;

/// Error taxonomy shared by every codec primitive in this crate.
///
/// Variants split into two groups: framing errors that a peer can trigger by
/// sending malformed bytes (these are ordinary `Result` values the caller is
/// expected to handle by tearing the connection down), and contract
/// violations that indicate a caller bug (these are never supposed to be
/// reachable from network input and are treated as assertion failures, see
/// [`weir_utils::safe_assert`]).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    #[error("allocation failed")]
    AllocFailed,
    #[error("header field does not support this operation")]
    NonSupportedField,
    #[error("unsupported packet type")]
    NonSupportedMsgType,
    #[error("value exceeds the field's maximum size")]
    SizeTooLarge,
    #[error("destination buffer too small to hold the field value")]
    TooSmallBuffer,
    #[error("body exceeds MAX_BODY_SIZE")]
    BodyTooLarge,
    #[error("serializer is still draining the previous packet")]
    SerializeCtxBusy,
    #[error("destination has insufficient committed capacity")]
    NoEnoughCapacity,
    #[error("packet exceeds MAX_PACKET_SIZE")]
    PacketTooBig,
    #[error("magic words did not match")]
    MagicWordsMisMatch,
    #[error("no data available to parse")]
    NoDataToParse,
    #[error("need more bytes before this field can be decoded")]
    NeedMore,
    #[error("header value is not valid for this field")]
    InvalidHeaderValue,
    #[error("a parsed packet is pending extraction, call receive_pkt first")]
    ExtractParsedPacketFirst,
    #[error("parsing is not complete, no packet is ready for extraction")]
    ParsingIsIncomplete,
    #[error("serializer has no packet ready to emit a chunk from")]
    NotReadyToExtract,
}

pub type WireResult<T> = Result<T, WireError>;
