//! Wire format: ASCII, `|`-delimited, one packet kind per datagram.
//!
//! Enum-dispatch replaces the class hierarchy (`Package` + subtypes) the
//! original implementation used: a single tag byte at the front of the
//! datagram selects the decoder, mirroring the teacher's `Message` enum
//! dispatch but hand-written because this framing is text, not a binary
//! cursor format.

use std::fmt;

use bytes::Bytes;

use crate::config::{MAX_PAYLOAD, SEPARATOR};

const TAG_INIT: u8 = 0;
const TAG_DATA: u8 = 1;
const TAG_ACK: u8 = 2;
const TAG_NAK: u8 = 3;
const TAG_FIN: u8 = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Upload,
    Download,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Upload => write!(f, "upload"),
            Operation::Download => write!(f, "download"),
        }
    }
}

impl std::str::FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Operation::Upload),
            "download" => Ok(Operation::Download),
            other => Err(format!("invalid operation '{other}', expected upload or download")),
        }
    }
}

/// Tag-only view of a packet kind, used by the dispatcher to remember the
/// last kind seen from a peer (spec.md §3 Session's `last-seen packet kind`)
/// without holding onto the packet's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketKind {
    Init,
    Data,
    Ack,
    Nak,
    Fin,
}

/// The five packet kinds of the wire protocol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Init {
        operation: Operation,
        file_stem: String,
        file_extension: String,
    },
    Data {
        sequence: u32,
        checksum: u8,
        payload: Bytes,
    },
    Ack {
        sequence: u32,
        valid: bool,
    },
    Nak {
        sequence: u32,
    },
    Fin,
}

/// Decode failures. `BadChecksum` still carries the sequence number so a
/// caller can NAK it even though the payload itself is untrusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    MalformedPacket(String),
    BadChecksum { sequence: u32, expected: u8, got: u8 },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::MalformedPacket(msg) => write!(f, "malformed packet: {msg}"),
            DecodeError::BadChecksum { sequence, expected, got } => write!(
                f,
                "bad checksum on sequence {sequence}: expected {expected}, got {got}"
            ),
        }
    }
}

impl std::error::Error for DecodeError {}

fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Splits `raw` on `|` into at most `max_parts` pieces; the final piece keeps
/// any remaining `|` bytes intact, which is what lets a DATA payload contain
/// the separator byte without corrupting the framing.
fn splitn_bytes(raw: &[u8], max_parts: usize) -> Vec<&[u8]> {
    let mut parts = Vec::with_capacity(max_parts);
    let mut rest = raw;

    for _ in 1..max_parts {
        match rest.iter().position(|&b| b == b'|') {
            Some(pos) => {
                parts.push(&rest[..pos]);
                rest = &rest[pos + 1..];
            }
            None => break,
        }
    }
    parts.push(rest);
    parts
}

fn parse_u32(field: &[u8]) -> Result<u32, DecodeError> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| DecodeError::MalformedPacket(format!("expected u32, got {field:?}")))
}

fn parse_u8(field: &[u8]) -> Result<u8, DecodeError> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| DecodeError::MalformedPacket(format!("expected u8, got {field:?}")))
}

fn parse_str(field: &[u8]) -> Result<String, DecodeError> {
    std::str::from_utf8(field)
        .map(str::to_owned)
        .map_err(|e| DecodeError::MalformedPacket(format!("invalid utf-8: {e}")))
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::Init { .. } => PacketKind::Init,
            Packet::Data { .. } => PacketKind::Data,
            Packet::Ack { .. } => PacketKind::Ack,
            Packet::Nak { .. } => PacketKind::Nak,
            Packet::Fin => PacketKind::Fin,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        match self {
            Packet::Init { operation, file_stem, file_extension } => {
                format!("{TAG_INIT}{SEPARATOR}{operation}{SEPARATOR}{file_stem}{SEPARATOR}{file_extension}")
                    .into_bytes()
            }
            Packet::Data { sequence, checksum, payload } => {
                let mut out = format!("{TAG_DATA}{SEPARATOR}{sequence}{SEPARATOR}{checksum}{SEPARATOR}").into_bytes();
                out.extend_from_slice(payload);
                out
            }
            Packet::Ack { sequence, valid } => {
                format!("{TAG_ACK}{SEPARATOR}{sequence}{SEPARATOR}{valid}").into_bytes()
            }
            Packet::Nak { sequence } => format!("{TAG_NAK}{SEPARATOR}{sequence}").into_bytes(),
            Packet::Fin => TAG_FIN.to_string().into_bytes(),
        }
    }

    /// Builds a DATA packet, computing its checksum. Returns an error if the
    /// payload exceeds `MAX_PAYLOAD` — the sender's chunking loop should
    /// never produce one, so this is a defensive check on an internal
    /// invariant, not a user-input validation.
    pub fn data(sequence: u32, payload: impl Into<Bytes>) -> Result<Packet, String> {
        let payload = payload.into();
        if payload.len() > MAX_PAYLOAD {
            return Err(format!(
                "payload of {} bytes exceeds MAX_PAYLOAD ({})",
                payload.len(),
                MAX_PAYLOAD
            ));
        }
        let checksum = checksum(&payload);
        Ok(Packet::Data { sequence, checksum, payload })
    }

    pub fn decode(raw: &[u8]) -> Result<Packet, DecodeError> {
        let tag_end = raw.iter().position(|&b| b == b'|').unwrap_or(raw.len());
        let tag = parse_u8(&raw[..tag_end])?;

        match tag {
            TAG_INIT => Self::decode_init(raw),
            TAG_DATA => Self::decode_data(raw),
            TAG_ACK => Self::decode_ack(raw),
            TAG_NAK => Self::decode_nak(raw),
            TAG_FIN => Ok(Packet::Fin),
            other => Err(DecodeError::MalformedPacket(format!("unknown tag {other}"))),
        }
    }

    fn decode_init(raw: &[u8]) -> Result<Packet, DecodeError> {
        let parts = splitn_bytes(raw, 4);
        if parts.len() != 4 {
            return Err(DecodeError::MalformedPacket(format!(
                "INIT expects 4 fields, got {}",
                parts.len()
            )));
        }
        let operation: Operation = parse_str(parts[1])?
            .parse()
            .map_err(DecodeError::MalformedPacket)?;
        Ok(Packet::Init {
            operation,
            file_stem: parse_str(parts[2])?,
            file_extension: parse_str(parts[3])?,
        })
    }

    fn decode_data(raw: &[u8]) -> Result<Packet, DecodeError> {
        let parts = splitn_bytes(raw, 4);
        if parts.len() != 4 {
            return Err(DecodeError::MalformedPacket(format!(
                "DATA expects 4 fields, got {}",
                parts.len()
            )));
        }
        let sequence = parse_u32(parts[1])?;
        let expected = parse_u8(parts[2])?;
        let payload = Bytes::copy_from_slice(parts[3]);
        let got = checksum(&payload);

        if got != expected {
            return Err(DecodeError::BadChecksum { sequence, expected, got });
        }

        Ok(Packet::Data { sequence, checksum: got, payload })
    }

    fn decode_ack(raw: &[u8]) -> Result<Packet, DecodeError> {
        let parts = splitn_bytes(raw, 3);
        if parts.len() != 3 {
            return Err(DecodeError::MalformedPacket(format!(
                "ACK expects 3 fields, got {}",
                parts.len()
            )));
        }
        let sequence = parse_u32(parts[1])?;
        let valid = match parts[2] {
            b"true" => true,
            b"false" => false,
            other => {
                return Err(DecodeError::MalformedPacket(format!(
                    "invalid ACK valid-flag {other:?}"
                )))
            }
        };
        Ok(Packet::Ack { sequence, valid })
    }

    fn decode_nak(raw: &[u8]) -> Result<Packet, DecodeError> {
        let parts = splitn_bytes(raw, 2);
        if parts.len() != 2 {
            return Err(DecodeError::MalformedPacket(format!(
                "NAK expects 2 fields, got {}",
                parts.len()
            )));
        }
        Ok(Packet::Nak { sequence: parse_u32(parts[1])? })
    }
}
