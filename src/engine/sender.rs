use std::net::SocketAddr;
use std::time::Instant;

use bytes::Bytes;
use log::{debug, warn};

use crate::codec::Packet;
use crate::config::{Protocol, DEFAULT_RETRIES_REMAINING, MAX_TRIES, T_ACK};
use crate::endpoint::{Endpoint, RecvError};
use crate::error::{Result, TransferError};
use crate::io_chunks::ByteSource;
use crate::window::{successor_for, Successor, Window};

fn to_data_packet(sequence: u32, payload: Bytes) -> Packet {
    Packet::data(sequence, payload).expect("window items never exceed MAX_PAYLOAD")
}

/// Sender-side half of the ARQ engine (spec.md §4.3). Holds the in-flight
/// window and the global retry counter; every method either advances state
/// or reports an `Err` when `MAX_TRIES` is exhausted for the window head.
pub struct SenderEngine {
    window: Window,
    next_to_send: u32,
    successor: Successor,
    tries: u32,
    deadline: Option<Instant>,
}

impl SenderEngine {
    pub fn new(protocol: Protocol, start_sequence: u32) -> Self {
        Self {
            window: Window::new(protocol.window_size(), DEFAULT_RETRIES_REMAINING),
            next_to_send: start_sequence,
            successor: successor_for(protocol),
            tries: 0,
            deadline: None,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.window.is_empty()
    }

    pub fn has_room(&self) -> bool {
        self.window.has_room()
    }

    /// True once every sent chunk has been acknowledged and the source has
    /// no more data to offer.
    pub fn is_finished(&self, source_exhausted: bool) -> bool {
        source_exhausted && self.window.is_empty()
    }

    /// The wall-clock instant the window head's retransmit timer expires, if
    /// there is an unacked packet in flight. The server dispatcher polls
    /// this across sessions instead of blocking on any single one.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Pushes as many chunks as window room allows, sending each
    /// immediately. Returns `true` once `source` reports it has no more
    /// data.
    pub fn fill_window(
        &mut self,
        endpoint: &Endpoint,
        peer: SocketAddr,
        source: &mut dyn ByteSource,
        now: Instant,
    ) -> Result<bool> {
        let mut exhausted = false;
        while self.window.has_room() {
            match source.next_chunk()? {
                Some(chunk) => {
                    let payload = Bytes::from(chunk);
                    let packet = to_data_packet(self.next_to_send, payload.clone());
                    let was_empty = self.window.is_empty();
                    self.window.push(self.next_to_send, payload);
                    endpoint.send(&packet, peer)?;
                    if was_empty {
                        self.deadline = Some(now + T_ACK);
                    }
                    self.next_to_send = (self.successor)(self.next_to_send);
                }
                None => {
                    exhausted = true;
                    break;
                }
            }
        }
        Ok(exhausted)
    }

    /// The window head's retransmit timer has expired.
    pub fn handle_timeout(&mut self, endpoint: &Endpoint, peer: SocketAddr, now: Instant) -> Result<()> {
        let Some(base) = self.window.base() else {
            self.deadline = None;
            return Ok(());
        };
        self.tries += 1;
        if self.tries >= MAX_TRIES {
            return Err(TransferError::MaxRetriesExceeded { sequence: base });
        }
        if let Some(item) = self.window.get_mut(base) {
            let packet = to_data_packet(item.sequence, item.payload.clone());
            warn!("T_ACK elapsed waiting on sequence {base} from {peer}, retransmitting (try {}/{MAX_TRIES})", self.tries);
            endpoint.send(&packet, peer)?;
        }
        self.deadline = Some(now + T_ACK);
        Ok(())
    }

    /// An explicit NAK for `sequence`. Decrements that item's own retry
    /// budget, distinct from the window-head timeout counter above.
    pub fn handle_nak(&mut self, endpoint: &Endpoint, peer: SocketAddr, sequence: u32) -> Result<()> {
        let Some(item) = self.window.get_mut(sequence) else {
            debug!("NAK for out-of-window sequence {sequence} from {peer}, discarding");
            return Ok(());
        };
        if item.retries_remaining == 0 {
            return Err(TransferError::MaxRetriesExceeded { sequence });
        }
        item.retries_remaining -= 1;
        let remaining = item.retries_remaining;
        let packet = to_data_packet(item.sequence, item.payload.clone());
        warn!("NAK received for sequence {sequence} from {peer}, retransmitting ({remaining} retries left)");
        endpoint.send(&packet, peer)
            .map_err(TransferError::from)
    }

    /// A positive ACK. Out-of-window and `valid = false` acks are discarded
    /// rather than treated as progress.
    pub fn handle_ack(&mut self, sequence: u32, valid: bool) {
        if !valid {
            warn!("received ACK with valid=false for sequence {sequence}, discarding");
            return;
        }
        if !self.window.mark_acked(sequence) {
            debug!("ACK for out-of-window sequence {sequence}, discarding");
            return;
        }
        self.tries = 0;
        if self.window.base() == Some(sequence) {
            self.window.slide();
        }
        self.deadline = if self.window.is_empty() { None } else { Some(Instant::now() + T_ACK) };
    }

    /// Blocking convenience loop for the single-threaded client driver
    /// (spec.md §5): fills the window, waits up to `T_ACK` for a response,
    /// retransmits or advances, until every chunk has been sent and acked.
    pub fn send_all(
        &mut self,
        endpoint: &mut Endpoint,
        peer: SocketAddr,
        source: &mut dyn ByteSource,
    ) -> Result<()> {
        let mut exhausted = false;
        loop {
            if !exhausted {
                exhausted = self.fill_window(endpoint, peer, source, Instant::now())?;
            }
            if self.is_finished(exhausted) {
                return Ok(());
            }

            endpoint.set_timeout(Some(T_ACK))?;
            match endpoint.recv() {
                Ok((Packet::Ack { sequence, valid }, _)) => self.handle_ack(sequence, valid),
                Ok((Packet::Nak { sequence }, from)) => self.handle_nak(endpoint, from, sequence)?,
                Ok((other, from)) => {
                    debug!("unexpected {other:?} from {from} during data phase, discarding");
                }
                Err(RecvError::Timeout) => self.handle_timeout(endpoint, peer, Instant::now())?,
                Err(RecvError::MalformedPacket { peer, message }) => {
                    debug!("malformed packet from {peer}: {message}, discarding");
                }
                Err(RecvError::BadChecksum { peer, sequence, .. }) => {
                    debug!("bad checksum from {peer} on sequence {sequence}, discarding");
                }
                Err(RecvError::Io(e)) => return Err(e.into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finished_only_once_exhausted_and_window_empty() {
        let engine = SenderEngine::new(Protocol::StopAndWait, 0);
        assert!(engine.is_finished(true));
        assert!(!engine.is_finished(false));
    }

    #[test]
    fn ack_resets_tries_and_slides_on_base() {
        let mut engine = SenderEngine::new(Protocol::SelectiveRepeat, 0);
        engine.window.push(0, vec![1u8]);
        engine.window.push(1, vec![2u8]);
        engine.tries = 3;

        engine.handle_ack(0, true);

        assert_eq!(engine.tries, 0);
        assert_eq!(engine.window.base(), Some(1));
    }

    #[test]
    fn ack_with_valid_false_is_ignored() {
        let mut engine = SenderEngine::new(Protocol::StopAndWait, 0);
        engine.window.push(0, vec![1u8]);
        engine.tries = 2;

        engine.handle_ack(0, false);

        assert_eq!(engine.tries, 2);
        assert_eq!(engine.window.base(), Some(0));
    }
}
