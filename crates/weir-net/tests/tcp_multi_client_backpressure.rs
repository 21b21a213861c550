use std::net::TcpStream;
use std::thread;
use std::time::Duration;

#[path = "support/mod.rs"]
mod support;

use support::{recv_packet, send_packet, RunningServer};

/// A burst of packets larger than any single bounded queue in the relay
/// (connection RX/TX queues hold 16, the server queue holds 512) must still
/// all arrive, in order, even when the receiving side reads slower than
/// the sender writes. This exercises the collect/distribute backpressure
/// path without assuming anything about its internal queue depths.
#[test]
fn burst_larger_than_any_queue_survives_a_slow_reader() {
    let server = RunningServer::spawn();

    let mut alice = TcpStream::connect(server.addr).unwrap();
    let mut bob = TcpStream::connect(server.addr).unwrap();

    const N: u32 = 200;
    let sender = thread::spawn(move || {
        for i in 0..N {
            send_packet(&mut alice, "alice", "bob", &i.to_be_bytes());
        }
    });

    let mut received = Vec::with_capacity(N as usize);
    for _ in 0..N {
        let pkt = recv_packet(&mut bob);
        let mut raw = [0u8; 4];
        raw.copy_from_slice(pkt.body());
        received.push(u32::from_be_bytes(raw));
        // Read slower than the sender writes, so the relay's queues are
        // under real pressure for most of the burst.
        thread::sleep(Duration::from_micros(200));
    }

    sender.join().unwrap();

    let expected: Vec<u32> = (0..N).collect();
    assert_eq!(received, expected);

    server.stop();
}

/// A client that never reads at all must not wedge the relay for everyone
/// else: a second, well-behaved client should keep receiving broadcasts
/// while the stalled client's connection-level queues fill up and its read
/// interest gets deregistered.
#[test]
fn a_stalled_reader_does_not_starve_other_connections() {
    let server = RunningServer::spawn();

    let mut alice = TcpStream::connect(server.addr).unwrap();
    let stalled = TcpStream::connect(server.addr).unwrap();
    let mut bob = TcpStream::connect(server.addr).unwrap();
    // `stalled` intentionally never reads from here on.

    for i in 0..64u32 {
        send_packet(&mut alice, "alice", "bob", &i.to_be_bytes());
    }

    for i in 0..64u32 {
        let pkt = recv_packet(&mut bob);
        let mut raw = [0u8; 4];
        raw.copy_from_slice(pkt.body());
        assert_eq!(u32::from_be_bytes(raw), i);
    }

    drop(stalled);
    server.stop();
}
