//! Shared scaffolding for the end-to-end tests (spec.md §8): spins up a real
//! server on loopback with an ephemeral port, drives it on a background
//! thread, and tears it down with a shutdown flag rather than a kill signal.

use std::net::{SocketAddr, UdpSocket};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use rand::Rng;
use reliable_transfer::config::Protocol;
use reliable_transfer::server::Server;

pub struct RunningServer {
    pub addr: SocketAddr,
    pub storage_dir: PathBuf,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RunningServer {
    pub fn spawn(protocol: Protocol) -> Self {
        let storage_dir = tempfile::tempdir().unwrap().into_path();
        let mut server = Server::bind("127.0.0.1", 0, storage_dir.clone(), protocol).unwrap();
        let addr = server.local_addr().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);
        let handle = thread::spawn(move || {
            server.run(&shutdown_clone).unwrap();
        });
        Self { addr, storage_dir, shutdown, handle: Some(handle) }
    }
}

impl Drop for RunningServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn random_ascii(len: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| rng.gen_range(0x20u8..0x7f)).collect()
}

/// A UDP relay sitting between a client and the real server, flipping one
/// random byte in the payload of ~`corrupt_pct` percent of DATA datagrams it
/// forwards. Not a production code path — exists only to exercise spec.md
/// §8's "corruption survives transfer" scenario without touching the
/// checksum/NAK logic under test.
pub struct LossyRelay {
    pub addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl LossyRelay {
    pub fn spawn(upstream: SocketAddr, corrupt_pct: u8) -> Self {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_millis(100))).unwrap();
        let addr = socket.local_addr().unwrap();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = Arc::clone(&shutdown);

        let handle = thread::spawn(move || {
            let mut buf = vec![0u8; 2048];
            let mut client_addr: Option<SocketAddr> = None;
            let mut rng = rand::thread_rng();

            while !shutdown_clone.load(Ordering::Relaxed) {
                let (len, from) = match socket.recv_from(&mut buf) {
                    Ok(v) => v,
                    Err(_) => continue,
                };
                let mut datagram = buf[..len].to_vec();
                maybe_corrupt(&mut datagram, corrupt_pct, &mut rng);

                let to = if from == upstream {
                    match client_addr {
                        Some(c) => c,
                        None => continue,
                    }
                } else {
                    client_addr = Some(from);
                    upstream
                };
                let _ = socket.send_to(&datagram, to);
            }
        });

        Self { addr, shutdown, handle: Some(handle) }
    }
}

impl Drop for LossyRelay {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn maybe_corrupt(datagram: &mut [u8], corrupt_pct: u8, rng: &mut impl Rng) {
    const TAG_DATA: u8 = b'1';
    if datagram.first() != Some(&TAG_DATA) {
        return;
    }
    if rng.gen_range(0..100) >= corrupt_pct as u32 {
        return;
    }
    // Payload starts after the third '|'.
    let mut seps = datagram.iter().enumerate().filter(|(_, &b)| b == b'|');
    let Some((_, _)) = seps.next() else { return };
    let Some((_, _)) = seps.next() else { return };
    let Some((payload_start, _)) = seps.next() else { return };
    let payload_start = payload_start + 1;
    if payload_start >= datagram.len() {
        return;
    }
    let offset = payload_start + rng.gen_range(0..datagram.len() - payload_start);
    datagram[offset] ^= 0xff;
}
