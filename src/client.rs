//! Client driver (spec.md §4.5, §4.7 of the numbering above is server-side;
//! this is the single-threaded client sequence): handshake, data phase,
//! teardown, all sequential in one thread per spec.md §5. Generalized from
//! the teacher's `RakClient` connect/disconnect handshake, simplified
//! because this protocol has no connection-establishment retries beyond the
//! uniform `T_ACK`/`MAX_TRIES` budget already used everywhere else.

use std::net::{SocketAddr, ToSocketAddrs};

use log::info;

use crate::codec::{Operation, Packet};
use crate::config::{Protocol, MAX_TRIES, T_ACK};
use crate::endpoint::{Endpoint, RecvError};
use crate::engine::{ReceiverEngine, SenderEngine};
use crate::error::{Result, TransferError};
use crate::io_chunks::{ByteSink, ByteSource};
use crate::session::split_file_name;

fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| TransferError::ProtocolViolation(format!("could not resolve {host}:{port}")))
}

/// Sends `packet` and waits up to `MAX_TRIES` attempts (each bounded by
/// `T_ACK`) for any reply, resending on each timeout. Used for the
/// handshake and teardown round-trips, which are one-shot request/response
/// exchanges rather than the windowed data phase.
fn request(endpoint: &mut Endpoint, peer: SocketAddr, packet: &Packet) -> Result<Packet> {
    for attempt in 0..MAX_TRIES {
        endpoint.send(packet, peer)?;
        endpoint.set_timeout(Some(T_ACK))?;
        match endpoint.recv() {
            Ok((reply, _)) => return Ok(reply),
            Err(RecvError::Timeout) => {
                log::warn!("no reply from {peer}, retrying ({}/{MAX_TRIES})", attempt + 1);
                continue;
            }
            Err(RecvError::MalformedPacket { message, .. }) => {
                log::debug!("malformed reply from {peer}: {message}, retrying");
                continue;
            }
            Err(RecvError::BadChecksum { .. }) => continue,
            Err(RecvError::Io(e)) => return Err(e.into()),
        }
    }
    Err(TransferError::MaxRetriesExceeded { sequence: 0 })
}

fn teardown(endpoint: &mut Endpoint, peer: SocketAddr) -> Result<()> {
    match request(endpoint, peer, &Packet::Fin)? {
        Packet::Ack { .. } => {
            info!("session with {peer} closed");
            Ok(())
        }
        other => Err(TransferError::ProtocolViolation(format!(
            "expected ACK closing session, got {other:?}"
        ))),
    }
}

/// Uploads `source` under `name` to the server at `host:port`.
pub fn upload(
    host: &str,
    port: u16,
    protocol: Protocol,
    name: &str,
    source: &mut dyn ByteSource,
) -> Result<()> {
    let peer = resolve(host, port)?;
    let mut endpoint = Endpoint::bind_ephemeral()?;
    let (file_stem, file_extension) = split_file_name(name);

    let init = Packet::Init { operation: Operation::Upload, file_stem, file_extension };
    match request(&mut endpoint, peer, &init)? {
        Packet::Ack { .. } => {}
        Packet::Fin => return Err(TransferError::ProtocolViolation(format!("server refused upload of {name}"))),
        other => {
            return Err(TransferError::ProtocolViolation(format!(
                "expected ACK or FIN after INIT, got {other:?}"
            )))
        }
    }

    info!("uploading {name} to {peer}");
    let mut sender = SenderEngine::new(protocol, 0);
    sender.send_all(&mut endpoint, peer, source)?;

    teardown(&mut endpoint, peer)
}

/// Downloads `name` from the server at `host:port` into `sink`.
pub fn download(
    host: &str,
    port: u16,
    protocol: Protocol,
    name: &str,
    sink: &mut dyn ByteSink,
) -> Result<()> {
    let peer = resolve(host, port)?;
    let mut endpoint = Endpoint::bind_ephemeral()?;
    let (file_stem, file_extension) = split_file_name(name);

    let init = Packet::Init { operation: Operation::Download, file_stem, file_extension };
    match request(&mut endpoint, peer, &init)? {
        Packet::Fin => return Err(TransferError::RemoteFileNotFound),
        Packet::Ack { .. } => {}
        other => {
            return Err(TransferError::ProtocolViolation(format!(
                "expected ACK or FIN after INIT, got {other:?}"
            )))
        }
    }

    // Prime the server: it waits for this before sending the first window.
    endpoint.send(&Packet::Ack { sequence: 0, valid: true }, peer)?;

    info!("downloading {name} from {peer}");
    let mut receiver = ReceiverEngine::new(protocol, 0);
    receiver.receive_all(&mut endpoint, peer, sink)?;

    teardown(&mut endpoint, peer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_localhost() {
        let addr = resolve("127.0.0.1", 0).unwrap();
        assert!(addr.ip().is_loopback());
    }
}
