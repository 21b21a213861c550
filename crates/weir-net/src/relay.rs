use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token};
use tracing::{debug, info, warn};
use weir_wire::{BoundedQueue, MinHeap, Packet};

use crate::connection::{set_socket_buf_size, Connection, DriveOutcome};
use crate::conn_list::ConnList;
use crate::limits::{LISTEN_BACKLOG, MAX_SERVER_PACKET_QUEUE};

const LISTENER_TOKEN: Token = Token(0);

/// Fairness key used by both scheduling heaps: smaller `count` sorts first,
/// `token_id` only breaks ties against itself when re-derived from a
/// `Token`.
#[derive(Clone, Copy, Default)]
struct FairnessKey {
    count: u64,
    token_id: usize,
}

/// Drives one relay server: a listener plus every inbound connection it has
/// accepted, and the single shared packet queue fairness moves packets
/// through between them.
///
/// Call [`RelayServer::run_once`] from a loop; each call performs exactly
/// one `wait_once` plus the full collect/distribute pass described for the
/// scheduler, then returns.
pub struct RelayServer {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    conns: ConnList,
    server_tx_queue: BoundedQueue<Packet>,
    next_token: usize,
    socket_buf_size: Option<usize>,
}

impl RelayServer {
    pub fn bind(addr: SocketAddr) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        // mio's TcpListener binds and starts listening in one call with an
        // implementation-defined backlog; LISTEN_BACKLOG documents the
        // value an explicit `listen(2)` call would pass.
        let _ = LISTEN_BACKLOG;
        poll.registry().register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        Ok(Self {
            poll,
            events: Events::with_capacity(1024),
            listener,
            conns: ConnList::new(),
            server_tx_queue: BoundedQueue::new(MAX_SERVER_PACKET_QUEUE),
            next_token: 1,
            socket_buf_size: None,
        })
    }

    pub fn with_socket_buf_size(mut self, size: usize) -> Self {
        self.socket_buf_size = Some(size);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn connection_count(&self) -> usize {
        self.conns.len()
    }

    /// Runs one iteration of the scheduler: wait for readiness, service
    /// every ready connection, run one fairness pass over both packet
    /// queues, arm write interest for anything newly queued, then garbage
    /// collect connections that disconnected this tick.
    pub fn run_once(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        self.poll.poll(&mut self.events, timeout)?;

        let mut ready = Vec::with_capacity(self.events.iter().count());
        for event in self.events.iter() {
            ready.push((event.token(), event.is_readable(), event.is_writable()));
        }

        for (token, readable, writable) in ready {
            if token == LISTENER_TOKEN {
                self.accept_loop();
                continue;
            }
            self.service_connection(token, readable, writable);
        }

        self.collect_rx_queue();
        self.distribute_tx_queue();
        self.arm_writers();

        let registry = self.poll.registry();
        self.conns.gc(|conn| {
            conn.close(registry);
            debug!(token = ?conn.token, peer = %conn.peer_addr, "connection closed");
        });

        Ok(())
    }

    fn accept_loop(&mut self) {
        loop {
            let (mut stream, peer_addr) = match self.listener.accept() {
                Ok(pair) => pair,
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return,
                Err(err) => {
                    warn!(%err, "accept failed");
                    return;
                }
            };

            if let Some(size) = self.socket_buf_size {
                set_socket_buf_size(&stream, size);
            }

            let token = Token(self.next_token);
            self.next_token += 1;

            let mut conn = Connection::new(token, stream, peer_addr);
            if let Err(err) = conn.register(self.poll.registry()) {
                warn!(%err, "failed to register accepted connection");
                continue;
            }

            info!(?token, %peer_addr, "accepted connection");
            self.conns.add(conn);
        }
    }

    fn service_connection(&mut self, token: Token, readable: bool, writable: bool) {
        let registry = self.poll.registry();
        let Some(conn) = self.conns.get_mut(token) else {
            return;
        };

        if readable {
            if conn.handle_readable(registry) == DriveOutcome::Disconnected {
                self.conns.mark_dead(token);
                return;
            }
        }
        if writable {
            if conn.handle_writable(registry) == DriveOutcome::Disconnected {
                self.conns.mark_dead(token);
            }
        }
    }

    /// Moves packets from every connection's RX queue into the shared
    /// server TX queue, visiting connections in ascending order of how many
    /// packets they have already had collected this run — so one chatty
    /// sender cannot starve the rest.
    fn collect_rx_queue(&mut self) {
        if self.server_tx_queue.is_full() {
            return;
        }

        let mut heap: MinHeap<FairnessKey, _> =
            MinHeap::with_capacity_exp(8, |a: &FairnessKey, b: &FairnessKey| a.count <= b.count);
        for conn in self.conns.iter() {
            if !conn.rx_queue.is_empty() {
                heap.insert(FairnessKey { count: conn.nr_received, token_id: conn.token.0 });
            }
        }

        while !heap.is_empty() && self.server_tx_queue.has_space() {
            let key = heap.shift();
            let token = Token(key.token_id);
            let Some(conn) = self.conns.get_mut(token) else { continue };

            let Some(pkt) = conn.rx_queue.dequeue() else { continue };
            conn.nr_received += 1;
            conn.release_read_backpressure(self.poll.registry());

            if self.server_tx_queue.enqueue(pkt).is_err() {
                break;
            }

            if !conn.rx_queue.is_empty() && self.server_tx_queue.has_space() {
                heap.insert(FairnessKey { count: conn.nr_received, token_id: conn.token.0 });
            }
        }
    }

    /// Moves packets out of the shared server TX queue into every
    /// connection's own TX queue, fanning each packet out to all
    /// connections (broadcast semantics: the packet's receiver header is
    /// carried but never consulted for routing).
    fn distribute_tx_queue(&mut self) {
        while let Some(pkt) = self.server_tx_queue.dequeue() {
            let mut heap: MinHeap<FairnessKey, _> = MinHeap::with_capacity_exp(8, |a: &FairnessKey, b: &FairnessKey| {
                a.count <= b.count
            });
            for conn in self.conns.iter() {
                if conn.tx_queue.has_space() {
                    heap.insert(FairnessKey { count: conn.nr_transmitted, token_id: conn.token.0 });
                }
            }

            while !heap.is_empty() {
                let key = heap.shift();
                let token = Token(key.token_id);
                if let Some(conn) = self.conns.get_mut(token) {
                    if conn.tx_queue.enqueue(pkt.clone()).is_ok() {
                        conn.nr_transmitted += 1;
                    }
                }
            }
        }
    }

    fn arm_writers(&mut self) {
        let registry = self.poll.registry();
        for conn in self.conns.iter_mut() {
            if !conn.tx_queue.is_empty() {
                conn.arm_writable(registry);
            }
        }
    }
}
