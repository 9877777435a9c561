//! Thin wrapper over a UDP socket, generalized from the teacher's
//! `RakSocket`/`Listener` (`std::net::UdpSocket` + a read buffer) down to the
//! four operations spec.md §4.2 names: `send`, `recv`, `set_timeout`,
//! `close`. The core never touches `std::net::UdpSocket` directly — only
//! through this endpoint — so decode/timeout failures surface in one place.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use log::trace;

use crate::codec::{DecodeError, Packet};
use crate::config::BUFSIZE;

/// Failure modes of `Endpoint::recv`. Decode failures still carry the peer
/// address (the datagram itself was received successfully) so a caller can
/// decide whether to discard silently or answer with a NAK.
#[derive(Debug)]
pub enum RecvError {
    Timeout,
    Io(io::Error),
    MalformedPacket { peer: SocketAddr, message: String },
    BadChecksum { peer: SocketAddr, sequence: u32, expected: u8, got: u8 },
}

impl std::fmt::Display for RecvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecvError::Timeout => write!(f, "timed out waiting for a datagram"),
            RecvError::Io(e) => write!(f, "io error: {e}"),
            RecvError::MalformedPacket { peer, message } => {
                write!(f, "malformed packet from {peer}: {message}")
            }
            RecvError::BadChecksum { peer, sequence, expected, got } => write!(
                f,
                "bad checksum from {peer} on sequence {sequence}: expected {expected}, got {got}"
            ),
        }
    }
}

impl std::error::Error for RecvError {}

impl From<io::Error> for RecvError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => RecvError::Timeout,
            _ => RecvError::Io(e),
        }
    }
}

pub struct Endpoint {
    socket: UdpSocket,
    read_buf: Vec<u8>,
}

impl Endpoint {
    pub fn bind(host: &str, port: u16) -> io::Result<Self> {
        let socket = UdpSocket::bind((host, port))?;
        trace!("bound datagram endpoint to {}:{}", host, port);
        Ok(Self { socket, read_buf: vec![0u8; BUFSIZE] })
    }

    /// Binds an ephemeral client-side endpoint.
    pub fn bind_ephemeral() -> io::Result<Self> {
        Self::bind("0.0.0.0", 0)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn connect<A: ToSocketAddrs>(&self, addr: A) -> io::Result<()> {
        self.socket.connect(addr)
    }

    pub fn send(&self, packet: &Packet, addr: SocketAddr) -> io::Result<()> {
        let raw = packet.encode();
        self.socket.send_to(&raw, addr)?;
        Ok(())
    }

    pub fn recv(&mut self) -> Result<(Packet, SocketAddr), RecvError> {
        let (len, peer) = self.socket.recv_from(&mut self.read_buf)?;
        let raw = &self.read_buf[..len];

        match Packet::decode(raw) {
            Ok(packet) => {
                trace!("received {:?} from {peer}", packet);
                Ok((packet, peer))
            }
            Err(DecodeError::MalformedPacket(message)) => {
                Err(RecvError::MalformedPacket { peer, message })
            }
            Err(DecodeError::BadChecksum { sequence, expected, got }) => {
                Err(RecvError::BadChecksum { peer, sequence, expected, got })
            }
        }
    }

    pub fn set_timeout(&self, duration: Option<Duration>) -> io::Result<()> {
        self.socket.set_read_timeout(duration)
    }

    /// UDP sockets close on drop; kept as an explicit operation so callers
    /// can express intent and so the server's shutdown path (spec.md §5) has
    /// a single place to extend if that ever needs more than a drop.
    pub fn close(self) {
        drop(self);
    }
}
