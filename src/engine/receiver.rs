use std::collections::BTreeMap;
use std::net::SocketAddr;

use bytes::Bytes;
use log::{debug, warn};

use crate::codec::Packet;
use crate::config::{Protocol, MAX_TRIES};
use crate::endpoint::{Endpoint, RecvError};
use crate::error::{Result, TransferError};
use crate::io_chunks::ByteSink;
use crate::window::{successor_for, Successor};

/// How a DATA packet's sequence number relates to what the receiver is
/// currently waiting for.
#[derive(Debug, PartialEq, Eq)]
enum SequenceClass {
    InOrder,
    Duplicate,
    Future,
}

type Classify = fn(u32, u32) -> SequenceClass;

/// Under Stop-and-Wait the window is 1, so there is no legitimate "future"
/// packet — anything that isn't `expected` is a duplicate of the one
/// already delivered.
fn classify_stop_and_wait(sequence: u32, expected: u32) -> SequenceClass {
    if sequence == expected {
        SequenceClass::InOrder
    } else {
        SequenceClass::Duplicate
    }
}

fn classify_selective_repeat(sequence: u32, expected: u32) -> SequenceClass {
    match sequence.cmp(&expected) {
        std::cmp::Ordering::Equal => SequenceClass::InOrder,
        std::cmp::Ordering::Less => SequenceClass::Duplicate,
        std::cmp::Ordering::Greater => SequenceClass::Future,
    }
}

fn classifier_for(protocol: Protocol) -> Classify {
    match protocol {
        Protocol::StopAndWait => classify_stop_and_wait,
        Protocol::SelectiveRepeat => classify_selective_repeat,
    }
}

fn ack(endpoint: &Endpoint, peer: SocketAddr, sequence: u32) -> Result<()> {
    endpoint
        .send(&Packet::Ack { sequence, valid: true }, peer)
        .map_err(TransferError::from)
}

/// Receiver-side half of the ARQ engine (spec.md §4.4). Tracks the next
/// expected sequence and, for Selective Repeat, a buffer of packets that
/// arrived ahead of it.
pub struct ReceiverEngine {
    expected: u32,
    successor: Successor,
    classify: Classify,
    tries: u32,
    out_of_order: BTreeMap<u32, Bytes>,
}

impl ReceiverEngine {
    pub fn new(protocol: Protocol, start_sequence: u32) -> Self {
        Self {
            expected: start_sequence,
            successor: successor_for(protocol),
            classify: classifier_for(protocol),
            tries: 0,
            out_of_order: BTreeMap::new(),
        }
    }

    pub fn expected(&self) -> u32 {
        self.expected
    }

    /// A DATA packet arrived with a verified checksum. Writes in-order
    /// payloads straight to `sink`, buffers future ones (Selective Repeat
    /// only), and re-acks duplicates without touching the sink.
    pub fn handle_data(
        &mut self,
        endpoint: &Endpoint,
        peer: SocketAddr,
        sequence: u32,
        payload: Bytes,
        sink: &mut dyn ByteSink,
    ) -> Result<()> {
        match (self.classify)(sequence, self.expected) {
            SequenceClass::InOrder => {
                sink.write_chunk(&payload)?;
                ack(endpoint, peer, sequence)?;
                self.tries = 0;
                self.expected = (self.successor)(self.expected);
                self.drain_buffered(endpoint, peer, sink)?;
            }
            SequenceClass::Duplicate => {
                debug!("duplicate DATA {sequence} from {peer} (expecting {}), re-acking", self.expected);
                ack(endpoint, peer, sequence)?;
            }
            SequenceClass::Future => {
                debug!("out-of-order DATA {sequence} from {peer} (expecting {}), buffering", self.expected);
                self.out_of_order.entry(sequence).or_insert(payload);
                ack(endpoint, peer, sequence)?;
            }
        }
        Ok(())
    }

    fn drain_buffered(&mut self, endpoint: &Endpoint, peer: SocketAddr, sink: &mut dyn ByteSink) -> Result<()> {
        while let Some(payload) = self.out_of_order.remove(&self.expected) {
            sink.write_chunk(&payload)?;
            self.expected = (self.successor)(self.expected);
        }
        Ok(())
    }

    /// The FIN handshake packet arrived: flush the sink and answer with an
    /// ACK (sequence 0 suffices — FIN carries no sequence of its own).
    pub fn handle_fin(&mut self, endpoint: &Endpoint, peer: SocketAddr, sink: &mut dyn ByteSink) -> Result<()> {
        sink.flush()?;
        ack(endpoint, peer, 0)
    }

    /// A Timeout, BadChecksum, or MalformedPacket occurred while waiting for
    /// `expected`: NAK it and count the attempt.
    pub fn on_recv_failure(&mut self, endpoint: &Endpoint, peer: SocketAddr) -> Result<()> {
        self.tries += 1;
        if self.tries >= MAX_TRIES {
            return Err(TransferError::MaxRetriesExceeded { sequence: self.expected });
        }
        warn!("no usable DATA for sequence {} from {peer}, sending NAK (try {}/{MAX_TRIES})", self.expected, self.tries);
        endpoint
            .send(&Packet::Nak { sequence: self.expected }, peer)
            .map_err(TransferError::from)
    }

    /// Blocking convenience loop for the single-threaded client driver: pulls
    /// packets until FIN is received and acked, writing payloads to `sink`.
    pub fn receive_all(&mut self, endpoint: &mut Endpoint, peer: SocketAddr, sink: &mut dyn ByteSink) -> Result<()> {
        loop {
            endpoint.set_timeout(Some(crate::config::T_ACK))?;
            match endpoint.recv() {
                Ok((Packet::Data { sequence, payload, .. }, from)) => {
                    self.handle_data(endpoint, from, sequence, payload, sink)?
                }
                Ok((Packet::Fin, from)) => {
                    self.handle_fin(endpoint, from, sink)?;
                    return Ok(());
                }
                Ok((other, from)) => {
                    debug!("unexpected {other:?} from {from} during data phase, discarding");
                }
                Err(RecvError::Timeout) => self.on_recv_failure(endpoint, peer)?,
                Err(RecvError::MalformedPacket { peer, message }) => {
                    debug!("malformed packet from {peer}: {message}");
                    self.on_recv_failure(endpoint, peer)?;
                }
                Err(RecvError::BadChecksum { peer, sequence, .. }) => {
                    debug!("bad checksum from {peer} on sequence {sequence}");
                    self.on_recv_failure(endpoint, peer)?;
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
    fn stop_and_wait_classifies_any_mismatch_as_duplicate() {
        assert_eq!(classify_stop_and_wait(0, 0), SequenceClass::InOrder);
        assert_eq!(classify_stop_and_wait(1, 0), SequenceClass::Duplicate);
    }

    #[test]
    fn selective_repeat_distinguishes_duplicate_and_future() {
        assert_eq!(classify_selective_repeat(5, 5), SequenceClass::InOrder);
        assert_eq!(classify_selective_repeat(3, 5), SequenceClass::Duplicate);
        assert_eq!(classify_selective_repeat(7, 5), SequenceClass::Future);
    }
}
