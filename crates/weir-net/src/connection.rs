use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;

use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use tracing::{debug, warn};
use weir_wire::{BoundedQueue, Packet, Parser, RingBuffer, Serializer};

use crate::limits::{
    MAX_CONN_PACKET_QUEUE, MAX_READ_BUF, MAX_READ_CHUNK_SIZE, MAX_WRITE_BUF_PER_CONN,
};

/// Result of driving one side of a connection's IO for a single readiness
/// event. The scheduler uses this to decide whether to keep the connection,
/// re-arm interest, or tear it down.
#[derive(Debug, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Made progress and there is nothing more to do right now.
    WouldBlock,
    /// Made progress but stopped early because a bounded queue filled up;
    /// the scheduler should leave the relevant interest deregistered until
    /// that queue drains.
    Backpressured,
    /// The peer closed the connection or a fatal IO error occurred.
    Disconnected,
}

/// One accepted TCP connection: socket, packet codec state, and the
/// per-connection bounded queues the relay scheduler moves packets through.
pub struct Connection {
    pub token: Token,
    pub peer_addr: SocketAddr,
    stream: TcpStream,

    read_ring: RingBuffer,
    parser: Parser,
    serializer: Serializer,
    write_ring: RingBuffer,

    /// Packets this connection has received from its peer, not yet
    /// collected into the server's shared TX queue.
    pub rx_queue: BoundedQueue<Packet>,
    /// Packets the server has assigned to this connection, not yet
    /// serialized onto the wire.
    pub tx_queue: BoundedQueue<Packet>,

    /// Monotonic counters used as the fairness key: connections with fewer
    /// packets collected/distributed so far are served first.
    pub nr_received: u64,
    pub nr_transmitted: u64,

    read_interest_armed: bool,
    write_interest_armed: bool,
    registered: bool,
}

impl Connection {
    pub fn new(token: Token, stream: TcpStream, peer_addr: SocketAddr) -> Self {
        Self {
            token,
            peer_addr,
            stream,
            read_ring: RingBuffer::with_capacity(MAX_READ_BUF),
            parser: Parser::new(),
            serializer: Serializer::new(),
            write_ring: RingBuffer::with_capacity(MAX_WRITE_BUF_PER_CONN),
            rx_queue: BoundedQueue::new(MAX_CONN_PACKET_QUEUE),
            tx_queue: BoundedQueue::new(MAX_CONN_PACKET_QUEUE),
            nr_received: 0,
            nr_transmitted: 0,
            read_interest_armed: true,
            write_interest_armed: false,
            registered: false,
        }
    }

    pub fn register(&mut self, registry: &Registry) -> io::Result<()> {
        registry.register(&mut self.stream, self.token, Interest::READABLE)?;
        self.registered = true;
        Ok(())
    }

    pub fn deregister(&mut self, registry: &Registry) {
        let _ = registry.deregister(&mut self.stream);
        self.registered = false;
    }

    /// Brings the registry's interest for this connection in line with
    /// `read_interest_armed`/`write_interest_armed`. Deregisters outright
    /// once neither side wants to be polled, so backpressure actually stops
    /// the kernel from waking us up instead of merely being advisory.
    fn rearm(&mut self, registry: &Registry) {
        let interest = match (self.read_interest_armed, self.write_interest_armed) {
            (true, true) => Some(Interest::READABLE.add(Interest::WRITABLE)),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        };
        match interest {
            Some(interest) if self.registered => {
                if let Err(err) = registry.reregister(&mut self.stream, self.token, interest) {
                    warn!(token = ?self.token, %err, "failed to reregister interest");
                }
            }
            Some(interest) => {
                if let Err(err) = registry.register(&mut self.stream, self.token, interest) {
                    warn!(token = ?self.token, %err, "failed to register interest");
                } else {
                    self.registered = true;
                }
            }
            None if self.registered => {
                self.deregister(registry);
            }
            None => {}
        }
    }

    /// Reads as much as is available off the socket into `read_ring`, feeds
    /// `read_ring`'s contents through the parser, and appends finished
    /// packets to `rx_queue`. Stops (without disconnecting) once the socket
    /// would block or the RX queue fills up, re-arming/disarming read
    /// interest to match.
    pub fn handle_readable(&mut self, registry: &Registry) -> DriveOutcome {
        loop {
            if self.rx_queue.is_full() {
                self.read_interest_armed = false;
                self.rearm(registry);
                return DriveOutcome::Backpressured;
            }

            if self.parser.is_ready_to_extract_packet() {
                match self.parser.receive_pkt() {
                    Ok(pkt) => {
                        if self.rx_queue.enqueue(pkt).is_err() {
                            // Lost the race against the is_full check above;
                            // queue is full, back off exactly as above.
                            self.read_interest_armed = false;
                            self.rearm(registry);
                            return DriveOutcome::Backpressured;
                        }
                        continue;
                    }
                    Err(err) => {
                        warn!(token = ?self.token, %err, "unreachable parser state");
                        return DriveOutcome::Disconnected;
                    }
                }
            }

            if self.parser.is_ready_to_send_chunk() && !self.read_ring.is_empty() {
                let mut chunk = vec![0u8; self.read_ring.size()];
                let sent = self.read_ring.receive_chunk(&mut chunk);
                match self.parser.send_chunk(&chunk[..sent]) {
                    Ok(report) => {
                        if report.accepted < sent {
                            self.read_ring.return_chunk(&chunk[report.accepted..sent]);
                        }
                        continue;
                    }
                    Err(err) => {
                        debug!(token = ?self.token, %err, "framing error, dropping connection");
                        return DriveOutcome::Disconnected;
                    }
                }
            }

            if self.read_ring.remaining_capacity() == 0 {
                // The parser still needs more before it can make progress
                // even with the whole read ring behind it; nothing left to
                // do until the next readiness event.
                return DriveOutcome::WouldBlock;
            }

            let want = MAX_READ_CHUNK_SIZE.min(self.read_ring.remaining_capacity());
            let mut stage = [0u8; MAX_READ_CHUNK_SIZE];
            match self.stream.read(&mut stage[..want]) {
                Ok(0) => return DriveOutcome::Disconnected,
                Ok(n) => {
                    self.read_ring.send_chunk(&stage[..n]);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    if !self.read_interest_armed {
                        self.read_interest_armed = true;
                        self.rearm(registry);
                    }
                    return DriveOutcome::WouldBlock;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    debug!(token = ?self.token, %err, "read error, dropping connection");
                    return DriveOutcome::Disconnected;
                }
            }
        }
    }

    /// Re-arms read interest after the scheduler has freed space in
    /// `rx_queue` by draining it.
    pub fn release_read_backpressure(&mut self, registry: &Registry) {
        if !self.read_interest_armed {
            self.read_interest_armed = true;
            self.rearm(registry);
        }
    }

    /// Arms write interest. Called by the scheduler once it has handed this
    /// connection at least one packet to send.
    pub fn arm_writable(&mut self, registry: &Registry) {
        if !self.write_interest_armed {
            self.write_interest_armed = true;
            self.rearm(registry);
        }
    }

    /// Serializes queued packets into the write ring (as space allows) and
    /// flushes the ring to the socket.
    pub fn handle_writable(&mut self, registry: &Registry) -> DriveOutcome {
        // Stage as many queued packets into the write ring as there is room
        // for; stops when the ring fills up or there is nothing left queued.
        loop {
            if self.write_ring.remaining_capacity() == 0 {
                break;
            }
            if self.serializer.is_ready_to_send_pkt() {
                let Some(pkt) = self.tx_queue.dequeue() else { break };
                if let Err(err) = self.serializer.send_pkt(&pkt) {
                    warn!(token = ?self.token, %err, "unreachable serializer state");
                    return DriveOutcome::Disconnected;
                }
            }

            let mut chunk = [0u8; MAX_READ_CHUNK_SIZE];
            let n = chunk.len().min(self.write_ring.remaining_capacity());
            let got = match self.serializer.receive_chunk(&mut chunk[..n]) {
                Ok(got) => got,
                Err(err) => {
                    warn!(token = ?self.token, %err, "unreachable serializer state");
                    return DriveOutcome::Disconnected;
                }
            };
            if got == 0 {
                break;
            }
            self.write_ring.send_chunk(&chunk[..got]);
        }

        let mut outcome = DriveOutcome::WouldBlock;
        while !self.write_ring.is_empty() {
            let mut out = [0u8; MAX_READ_CHUNK_SIZE];
            let n = self.write_ring.receive_chunk(&mut out);
            match self.stream.write(&out[..n]) {
                Ok(written) if written == n => {}
                Ok(written) => {
                    self.write_ring.return_chunk(&out[written..n]);
                    outcome = DriveOutcome::WouldBlock;
                    break;
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    self.write_ring.return_chunk(&out[..n]);
                    break;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => {
                    self.write_ring.return_chunk(&out[..n]);
                    continue;
                }
                Err(err) => {
                    debug!(token = ?self.token, %err, "write error, dropping connection");
                    return DriveOutcome::Disconnected;
                }
            }
        }

        if self.write_ring.is_empty() && self.tx_queue.is_empty() && self.write_interest_armed {
            self.write_interest_armed = false;
            self.rearm(registry);
        }

        outcome
    }

    pub fn close(&mut self, registry: &Registry) {
        self.deregister(registry);
        let _ = self.stream.shutdown(std::net::Shutdown::Both);
    }
}

/// Applies the kernel socket buffer size hint to a freshly accepted or
/// connected stream. Best-effort: failures are logged, never fatal.
pub fn set_socket_buf_size(stream: &TcpStream, size: usize) {
    use std::os::fd::AsRawFd;

    let fd = stream.as_raw_fd();
    let size = size as libc::c_int;
    for opt in [libc::SO_SNDBUF, libc::SO_RCVBUF] {
        let rc = unsafe {
            libc::setsockopt(
                fd,
                libc::SOL_SOCKET,
                opt,
                std::ptr::from_ref(&size).cast(),
                std::mem::size_of::<libc::c_int>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            warn!(opt, "setsockopt failed for socket buffer size");
        }
    }
}
