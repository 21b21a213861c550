//! Wire codec and bounded-memory primitives for the relay.
//!
//! This crate has no knowledge of sockets or readiness notification; it is
//! the pure, allocation-aware core that `weir-net` drives from an event
//! loop: byte buffers ([`RingBuffer`], [`Blob`]), bounded containers
//! ([`BoundedQueue`], [`MinHeap`]), and the packet codec itself
//! ([`Packet`], [`Parser`], [`Serializer`]).

mod blob;
mod error;
mod heap;
mod packet;
mod parser;
mod queue;
mod ringbuf;
mod serializer;

pub use blob::Blob;
pub use error::{WireError, WireResult};
pub use heap::MinHeap;
pub use packet::{
    HeaderField, HeaderValue, Packet, PacketType, MAGIC_WORDS, MAX_BODY_SIZE,
    MAX_HEADER_VALUE_SIZE, MAX_PACKET_SIZE,
};
pub use parser::{ParseState, Parser, SendChunkReport};
pub use queue::BoundedQueue;
pub use ringbuf::RingBuffer;
pub use serializer::Serializer;
