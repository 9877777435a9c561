//! Server dispatcher (spec.md §4.6): owns the bound endpoint and a
//! `peer -> Session` map, demultiplexing datagrams by address. Generalized
//! from the teacher's `Listener` (its `clients: HashMap<SocketAddr, RakSession>`
//! plus a `handle()` dispatch loop) down to the single-threaded, wall-clock
//! deadline model spec.md §4.6/§5 requires instead of RakNet's per-connection
//! background bookkeeping.

use std::collections::HashMap;
use std::fs::File;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::codec::{Operation, Packet};
use crate::config::Protocol;
use crate::endpoint::{Endpoint, RecvError};
use crate::engine::{ReceiverEngine, SenderEngine};
use crate::error::{Result, TransferError};
use crate::io_chunks::{ByteSource, ChunkedReader, WriteSink};
use crate::session::{join_file_name, Role, Session, SessionState};

/// How long a single `recv` call blocks before the dispatcher re-scans every
/// session's retransmit deadline. Bounded by `T_ACK` so a session's timeout
/// is never detected more than one poll interval late.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub struct Server {
    endpoint: Endpoint,
    sessions: HashMap<SocketAddr, Session>,
    storage_dir: PathBuf,
    protocol: Protocol,
}

impl Server {
    pub fn bind(host: &str, port: u16, storage_dir: impl Into<PathBuf>, protocol: Protocol) -> Result<Self> {
        let endpoint = Endpoint::bind(host, port)?;
        info!("server listening on {}:{}", host, port);
        Ok(Self {
            endpoint,
            sessions: HashMap::new(),
            storage_dir: storage_dir.into(),
            protocol,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.endpoint.local_addr()
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Runs the event loop until `shutdown` is set. A single `recv` (bounded
    /// by `POLL_INTERVAL`) followed by a deadline scan is one tick; this is
    /// the unit the single-threaded model (spec.md §5) repeats forever.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        while !shutdown.load(Ordering::Relaxed) {
            self.tick()?;
        }
        Ok(())
    }

    pub fn tick(&mut self) -> Result<()> {
        self.endpoint.set_timeout(Some(POLL_INTERVAL))?;
        match self.endpoint.recv() {
            Ok((packet, peer)) => {
                if let Err(e) = self.route(packet, peer) {
                    self.fail_session(peer, e);
                }
            }
            Err(RecvError::Timeout) => {}
            Err(RecvError::MalformedPacket { peer, message }) => {
                debug!("malformed packet from {peer}: {message}");
                if let Err(e) = self.notify_recv_failure(peer) {
                    self.fail_session(peer, e);
                }
            }
            Err(RecvError::BadChecksum { peer, sequence, .. }) => {
                debug!("bad checksum from {peer} on sequence {sequence}");
                if let Err(e) = self.notify_recv_failure(peer) {
                    self.fail_session(peer, e);
                }
            }
            Err(RecvError::Io(e)) => return Err(e.into()),
        }
        self.check_deadlines()
    }

    fn fail_session(&mut self, peer: SocketAddr, e: TransferError) {
        error!("session with {peer} failed: {e}");
        self.sessions.remove(&peer);
    }

    /// A corrupted or malformed datagram arrived from a peer we can't decode
    /// well enough to route by packet kind. If `peer` is mid-upload (we're
    /// the receiver), the expected sequence still needs a NAK per spec.md
    /// §4.4 — otherwise the sender has nothing to prompt its retransmit.
    fn notify_recv_failure(&mut self, peer: SocketAddr) -> Result<()> {
        let Some(session) = self.sessions.get_mut(&peer) else {
            return Ok(());
        };
        let Role::Receiving { engine, .. } = &mut session.role else {
            return Ok(());
        };
        engine.on_recv_failure(&self.endpoint, peer)
    }

    /// Refills a download session's window after an ACK, and once the
    /// source is exhausted and every chunk acked, sends the completion FIN
    /// that lets the client's receiver engine stop blocking (spec.md
    /// §4.3/§4.5: "terminates on FIN from server"). The client still runs
    /// its own teardown FIN/ACK afterwards; this only ends the data phase.
    fn advance_sending(
        endpoint: &Endpoint,
        engine: &mut SenderEngine,
        source: &mut dyn ByteSource,
        state: &mut SessionState,
        file_name: &str,
        peer: SocketAddr,
        mut source_exhausted: bool,
    ) -> Result<bool> {
        if !source_exhausted && engine.has_room() {
            source_exhausted = engine.fill_window(endpoint, peer, source, Instant::now())?;
        }
        if *state != SessionState::FinSent && engine.is_finished(source_exhausted) {
            endpoint.send(&Packet::Fin, peer)?;
            *state = SessionState::FinSent;
            info!("{peer} ({file_name}) finished sending, awaiting teardown FIN");
        }
        Ok(source_exhausted)
    }

    fn check_deadlines(&mut self) -> Result<()> {
        let now = Instant::now();
        let mut failed = Vec::new();

        for (peer, session) in self.sessions.iter_mut() {
            if let Role::Sending { engine, .. } = &mut session.role {
                if matches!(engine.deadline(), Some(d) if d <= now) {
                    if let Err(e) = engine.handle_timeout(&self.endpoint, *peer, now) {
                        failed.push((*peer, e));
                    }
                }
            }
        }

        for (peer, e) in failed {
            self.fail_session(peer, e);
        }
        Ok(())
    }

    fn route(&mut self, packet: Packet, peer: SocketAddr) -> Result<()> {
        let Some(session) = self.sessions.get_mut(&peer) else {
            return match packet {
                Packet::Init { operation, file_stem, file_extension } => {
                    self.create_session(peer, operation, file_stem, file_extension)
                }
                other => {
                    warn!("{other:?} from unknown peer {peer} (expected INIT), discarding");
                    Ok(())
                }
            };
        };

        session.last_seen = packet.kind();

        match packet {
            Packet::Init { .. } => {
                debug!("duplicate INIT from already-registered peer {peer}, discarding");
                Ok(())
            }
            Packet::Data { sequence, payload, .. } => {
                let Role::Receiving { engine, sink } = &mut session.role else {
                    warn!("DATA from {peer} on a sender-role session, discarding");
                    return Ok(());
                };
                engine.handle_data(&self.endpoint, peer, sequence, payload, sink.as_mut())
            }
            Packet::Ack { sequence, valid } => {
                if session.state == SessionState::InitReceived && sequence == 0 && valid {
                    let Role::Sending { engine, source } = &mut session.role else {
                        warn!("priming ACK from {peer} on a receiver-role session, discarding");
                        return Ok(());
                    };
                    session.state = SessionState::Transfer;
                    session.source_exhausted = Self::advance_sending(
                        &self.endpoint,
                        engine,
                        source.as_mut(),
                        &mut session.state,
                        &session.file_name,
                        peer,
                        session.source_exhausted,
                    )?;
                    return Ok(());
                }
                let Role::Sending { engine, source } = &mut session.role else {
                    debug!("ACK from {peer} on a receiver-role session, discarding");
                    return Ok(());
                };
                engine.handle_ack(sequence, valid);
                session.source_exhausted = Self::advance_sending(
                    &self.endpoint,
                    engine,
                    source.as_mut(),
                    &mut session.state,
                    &session.file_name,
                    peer,
                    session.source_exhausted,
                )?;
                Ok(())
            }
            Packet::Nak { sequence } => {
                let Role::Sending { engine, .. } = &mut session.role else {
                    debug!("NAK from {peer} on a receiver-role session, discarding");
                    return Ok(());
                };
                engine.handle_nak(&self.endpoint, peer, sequence)
            }
            Packet::Fin => {
                match &mut session.role {
                    Role::Receiving { engine, sink } => {
                        engine.handle_fin(&self.endpoint, peer, sink.as_mut())?;
                    }
                    Role::Sending { .. } => {
                        self.endpoint.send(&Packet::Ack { sequence: 0, valid: true }, peer)?;
                    }
                }
                info!("session with {peer} ({}) closed", session.file_name);
                self.sessions.remove(&peer);
                Ok(())
            }
        }
    }

    fn create_session(
        &mut self,
        peer: SocketAddr,
        operation: Operation,
        file_stem: String,
        file_extension: String,
    ) -> Result<()> {
        let file_name = join_file_name(&file_stem, &file_extension);
        let path = self.storage_dir.join(&file_name);

        match operation {
            Operation::Upload => {
                let file = File::create(&path)?;
                let sink = Box::new(WriteSink::new(file));
                let engine = ReceiverEngine::new(self.protocol, 0);
                self.endpoint.send(&Packet::Ack { sequence: 0, valid: true }, peer)?;
                info!("{peer} started upload of {file_name}");
                self.sessions.insert(
                    peer,
                    Session::new(peer, operation, file_name, SessionState::Transfer, Role::Receiving { engine, sink }),
                );
            }
            Operation::Download => {
                if !path.exists() {
                    warn!("{peer} requested download of missing file {file_name}");
                    self.endpoint.send(&Packet::Fin, peer)?;
                    return Ok(());
                }
                let file = File::open(&path)?;
                let source: Box<dyn ByteSource> = Box::new(ChunkedReader::new(file));
                let engine = SenderEngine::new(self.protocol, 0);
                self.endpoint.send(&Packet::Ack { sequence: 0, valid: true }, peer)?;
                info!("{peer} started download of {file_name}, awaiting priming ACK");
                self.sessions.insert(
                    peer,
                    Session::new(
                        peer,
                        operation,
                        file_name,
                        SessionState::InitReceived,
                        Role::Sending { engine, source },
                    ),
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::UdpSocket;
    use std::time::Duration;

    use super::*;

    fn client_socket(server_addr: SocketAddr) -> UdpSocket {
        let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
        socket.set_read_timeout(Some(Duration::from_secs(1))).unwrap();
        socket.connect(server_addr).unwrap();
        socket
    }

    fn recv_packet(socket: &UdpSocket) -> Packet {
        let mut buf = [0u8; 1500];
        let n = socket.recv(&mut buf).unwrap();
        Packet::decode(&buf[..n]).unwrap()
    }

    #[test]
    fn upload_session_registers_then_deregisters_on_fin() {
        let storage_dir = tempfile::tempdir().unwrap();
        let mut server = Server::bind("127.0.0.1", 0, storage_dir.path(), Protocol::StopAndWait).unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = client_socket(server_addr);

        let init = Packet::Init { operation: Operation::Upload, file_stem: "g".into(), file_extension: "bin".into() };
        client.send(&init.encode()).unwrap();
        server.tick().unwrap();
        assert_eq!(server.session_count(), 1);
        assert!(matches!(recv_packet(&client), Packet::Ack { sequence: 0, valid: true }));

        client.send(&Packet::Fin.encode()).unwrap();
        server.tick().unwrap();
        assert_eq!(server.session_count(), 0, "session must deregister after FIN");
        assert!(matches!(recv_packet(&client), Packet::Ack { .. }));
    }

    #[test]
    fn download_past_one_window_keeps_sending_until_fin() {
        let storage_dir = tempfile::tempdir().unwrap();
        let file_name = "multi.bin";
        std::fs::write(storage_dir.path().join(file_name), vec![7u8; 4 * crate::config::MAX_PAYLOAD]).unwrap();

        let mut server = Server::bind("127.0.0.1", 0, storage_dir.path(), Protocol::StopAndWait).unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = client_socket(server_addr);

        let init = Packet::Init {
            operation: Operation::Download,
            file_stem: "multi".into(),
            file_extension: "bin".into(),
        };
        client.send(&init.encode()).unwrap();
        server.tick().unwrap();
        assert!(matches!(recv_packet(&client), Packet::Ack { sequence: 0, valid: true }));

        client.send(&Packet::Ack { sequence: 0, valid: true }.encode()).unwrap();
        server.tick().unwrap();

        let mut expected_seq = 0u32;
        let mut chunks_seen = 0;
        loop {
            match recv_packet(&client) {
                Packet::Data { sequence, .. } => {
                    assert_eq!(sequence, expected_seq, "Stop-and-Wait must not send ahead of the unacked chunk");
                    chunks_seen += 1;
                    client.send(&Packet::Ack { sequence, valid: true }.encode()).unwrap();
                    server.tick().unwrap();
                    expected_seq ^= 1;
                }
                Packet::Fin => break,
                other => panic!("unexpected {other:?} during data phase"),
            }
        }
        assert_eq!(chunks_seen, 4, "all four chunks of a window-spanning download must be sent");
    }

    #[test]
    fn download_of_missing_file_replies_fin_without_registering() {
        let storage_dir = tempfile::tempdir().unwrap();
        let mut server = Server::bind("127.0.0.1", 0, storage_dir.path(), Protocol::SelectiveRepeat).unwrap();
        let server_addr = server.local_addr().unwrap();
        let client = client_socket(server_addr);

        let init = Packet::Init {
            operation: Operation::Download,
            file_stem: "missing".into(),
            file_extension: "bin".into(),
        };
        client.send(&init.encode()).unwrap();
        server.tick().unwrap();

        assert_eq!(server.session_count(), 0);
        assert_eq!(recv_packet(&client), Packet::Fin);
    }
}
