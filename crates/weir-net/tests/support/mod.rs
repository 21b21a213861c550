use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use weir_net::RelayServer;
use weir_wire::{HeaderField, Packet, PacketType, Parser, Serializer};

/// Spawns a `RelayServer` bound to an OS-assigned port on a background
/// thread, returning its address plus a handle that stops the loop and
/// joins the thread when dropped or explicitly stopped.
pub struct RunningServer {
    pub addr: std::net::SocketAddr,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RunningServer {
    pub fn spawn() -> Self {
        let addr: std::net::SocketAddr = "127.0.0.1:0".parse().unwrap();
        let mut server = RelayServer::bind(addr).expect("bind relay server");
        // mio's listener exposes the bound address through the OS socket;
        // reconnect via a throwaway std listener lookup is unnecessary here
        // since RelayServer::bind already bound the real ephemeral port.
        let bound_addr = local_addr_of(&server);

        let stop = Arc::new(AtomicBool::new(false));
        let stop_clone = stop.clone();
        let handle = std::thread::spawn(move || {
            while !stop_clone.load(Ordering::Relaxed) {
                server.run_once(Some(Duration::from_millis(20))).expect("run_once");
            }
        });

        Self { addr: bound_addr, stop, handle: Some(handle) }
    }

    pub fn stop(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap();
        }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn local_addr_of(server: &RelayServer) -> std::net::SocketAddr {
    server.local_addr().expect("bound relay server has a local address")
}

/// Encodes one packet using the real wire codec and writes it to `stream`.
pub fn send_packet(stream: &mut TcpStream, sender: &str, receiver: &str, body: &[u8]) {
    let mut pkt = Packet::new(PacketType::Msg);
    pkt.header_set(HeaderField::Sender, sender.as_bytes()).unwrap();
    pkt.header_set(HeaderField::Receiver, receiver.as_bytes()).unwrap();
    pkt.body_send_chunk(body).unwrap();

    let mut ser = Serializer::new();
    ser.send_pkt(&pkt).unwrap();
    let mut chunk = [0u8; 4096];
    loop {
        let n = ser.receive_chunk(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        stream.write_all(&chunk[..n]).unwrap();
    }
}

/// Blocks until one full packet has been read back off `stream`, decoding
/// it with the real wire codec.
pub fn recv_packet(stream: &mut TcpStream) -> Packet {
    let mut parser = Parser::new();
    let mut buf = [0u8; 4096];
    loop {
        if parser.is_ready_to_extract_packet() {
            return parser.receive_pkt().unwrap();
        }
        let n = stream.read(&mut buf).expect("read from stream");
        assert!(n > 0, "peer closed before a full packet arrived");
        parser.send_chunk(&buf[..n]).unwrap();
    }
}
