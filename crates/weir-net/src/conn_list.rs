use mio::Token;

use crate::connection::Connection;

/// The set of live connections, keyed by `mio::Token`.
///
/// Removal is deferred: [`ConnList::mark_dead`] just flags a connection,
/// and [`ConnList::gc`] does the actual single-pass removal, invoking a
/// callback for each connection it drops. This keeps the point where a
/// connection (and its read/write queues) actually gets freed separate
/// from the traversal that decides it's dead, so nothing is ever removed
/// mid-iteration while the scheduler is looking at the list.
#[derive(Default)]
pub struct ConnList {
    conns: Vec<Connection>,
    dead: Vec<Token>,
}

impl ConnList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, conn: Connection) {
        self.conns.push(conn);
    }

    pub fn get(&self, token: Token) -> Option<&Connection> {
        self.conns.iter().find(|c| c.token == token)
    }

    pub fn get_mut(&mut self, token: Token) -> Option<&mut Connection> {
        self.conns.iter_mut().find(|c| c.token == token)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.conns.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Connection> {
        self.conns.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Flags `token` for removal on the next [`ConnList::gc`] call. Safe to
    /// call from within a traversal of the list.
    pub fn mark_dead(&mut self, token: Token) {
        if !self.dead.contains(&token) {
            self.dead.push(token);
        }
    }

    /// Removes every connection flagged by `mark_dead` in a single pass,
    /// calling `before_remove` on each before it is dropped.
    pub fn gc<F: FnMut(&mut Connection)>(&mut self, mut before_remove: F) {
        if self.dead.is_empty() {
            return;
        }
        let dead = std::mem::take(&mut self.dead);
        self.conns.retain_mut(|conn| {
            if dead.contains(&conn.token) {
                before_remove(conn);
                false
            } else {
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::net::{SocketAddr, TcpListener as StdTcpListener, TcpStream as StdTcpStream};

    use mio::net::TcpStream;

    use super::*;

    fn connected_pair() -> (TcpStream, StdTcpStream) {
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let addr: SocketAddr = listener.local_addr().unwrap();
        let client = StdTcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        server.set_nonblocking(true).unwrap();
        (TcpStream::from_std(server), client)
    }

    #[test]
    fn gc_removes_only_marked_connections_in_one_pass() {
        let mut list = ConnList::new();
        let mut keepers = Vec::new();
        for i in 0..3 {
            let (stream, client) = connected_pair();
            keepers.push(client);
            let addr = stream.peer_addr().unwrap();
            list.add(Connection::new(Token(i), stream, addr));
        }
        list.mark_dead(Token(1));

        let mut removed = Vec::new();
        list.gc(|conn| removed.push(conn.token));

        assert_eq!(removed, vec![Token(1)]);
        assert_eq!(list.len(), 2);
        assert!(list.get(Token(1)).is_none());
        assert!(list.get(Token(0)).is_some());
        assert!(list.get(Token(2)).is_some());
    }

    #[test]
    fn gc_is_a_no_op_with_nothing_marked() {
        let mut list = ConnList::new();
        let (stream, _client) = connected_pair();
        let addr = stream.peer_addr().unwrap();
        list.add(Connection::new(Token(0), stream, addr));
        list.gc(|_| panic!("should not be called"));
        assert_eq!(list.len(), 1);
    }
}
