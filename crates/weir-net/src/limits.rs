//! Sizing constants for the relay's per-connection and server-wide buffers.
//!
//! A connection reads off the wire in small chunks and drains a bounded
//! write ring into the socket; the fairness layer in between moves whole
//! [`weir_wire::Packet`]s rather than raw bytes.

/// Size of a single non-blocking `read(2)`/`write(2)` fill, and the chunk
/// size used when staging serialized bytes into a connection's write ring.
pub const MAX_READ_CHUNK_SIZE: usize = 128;

/// Capacity of a connection's inbound byte ring buffer, sitting between the
/// raw socket and the parser.
pub const MAX_READ_BUF: usize = 1 << 10;

/// Capacity of a connection's outbound byte ring buffer, i.e. how much
/// serialized-but-not-yet-written data a single slow reader may accumulate
/// before the relay must start exerting backpressure on its own queues.
pub const MAX_WRITE_BUF_PER_CONN: usize = (1 << 20) * 32;

/// Capacity of each connection's inbound and outbound packet queues.
pub const MAX_CONN_PACKET_QUEUE: usize = 16;

/// Capacity of the single server-wide packet queue that sits between the
/// collect and distribute phases of the relay scheduler.
pub const MAX_SERVER_PACKET_QUEUE: usize = 512;

/// Backlog passed to `listen(2)`.
pub const LISTEN_BACKLOG: u32 = 20;
