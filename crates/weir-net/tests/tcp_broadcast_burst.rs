use std::net::TcpStream;
use std::thread;

#[path = "support/mod.rs"]
mod support;

use support::{recv_packet, send_packet, RunningServer};

const NUM_CLIENTS: usize = 4;
const BURST_SIZE: u32 = 20;
const PAYLOAD_SIZE: usize = 64 * 1024;

/// Every connected client bursts packets concurrently; every client
/// (including every other sender) must see every packet from every sender,
/// in the order that sender sent them, with the payload intact.
#[test]
fn concurrent_bursts_from_every_client_reach_every_client() {
    let server = RunningServer::spawn();

    let streams: Vec<TcpStream> =
        (0..NUM_CLIENTS).map(|_| TcpStream::connect(server.addr).unwrap()).collect();

    let senders: Vec<_> = streams
        .iter()
        .enumerate()
        .map(|(i, stream)| {
            let mut stream = stream.try_clone().unwrap();
            thread::spawn(move || {
                let name = format!("client-{i}");
                for seq in 0..BURST_SIZE {
                    let mut body = seq.to_be_bytes().to_vec();
                    body.resize(PAYLOAD_SIZE, (seq & 0xFF) as u8);
                    send_packet(&mut stream, &name, "", &body);
                }
            })
        })
        .collect();

    let receivers: Vec<_> = streams
        .into_iter()
        .map(|stream| {
            thread::spawn(move || {
                let mut stream = stream;
                let mut next_seq = vec![0u32; NUM_CLIENTS];
                let total = NUM_CLIENTS * BURST_SIZE as usize;
                let mut received = 0;
                while received < total {
                    let pkt = recv_packet(&mut stream);
                    let sender = String::from_utf8(pkt.sender().to_vec()).unwrap();
                    let idx: usize = sender.strip_prefix("client-").unwrap().parse().unwrap();

                    let body = pkt.body();
                    let mut raw = [0u8; 4];
                    raw.copy_from_slice(&body[..4]);
                    let seq = u32::from_be_bytes(raw);

                    assert_eq!(seq, next_seq[idx], "out-of-order packet from {sender}");
                    assert_eq!(body.len(), PAYLOAD_SIZE, "wrong payload size from {sender}");
                    assert!(
                        body[4..].iter().all(|&b| b == (seq & 0xFF) as u8),
                        "corrupted payload from {sender}, seq {seq}"
                    );

                    next_seq[idx] += 1;
                    received += 1;
                }
                assert!(next_seq.iter().all(|&n| n == BURST_SIZE), "missed packets from a sender");
            })
        })
        .collect();

    for handle in senders {
        handle.join().unwrap();
    }
    for handle in receivers {
        handle.join().unwrap();
    }

    server.stop();
}
