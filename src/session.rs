//! Per-peer session state (spec.md §3 Session, §4.5 state machine).
//! Generalized from the teacher's `RakSession`/connection struct: one
//! instance per remote peer, holding whichever half of the ARQ engine that
//! peer's role requires plus the filesystem handle feeding or draining it.

use std::net::SocketAddr;

use crate::codec::{Operation, PacketKind};
use crate::engine::{ReceiverEngine, SenderEngine};
use crate::io_chunks::{ByteSink, ByteSource};

/// States named by spec.md §4.5. The server never constructs `FinSent` —
/// only the client sends the second FIN of a teardown — but both ends pass
/// through the other four.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    InitSent,
    InitReceived,
    Transfer,
    FinSent,
    FinReceived,
    Closed,
}

/// Which half of the ARQ engine this session runs, paired with the
/// filesystem handle it reads from or writes to. An upload session is a
/// receiver on the server and a sender on the client; a download session is
/// the reverse.
pub enum Role {
    Sending { engine: SenderEngine, source: Box<dyn ByteSource> },
    Receiving { engine: ReceiverEngine, sink: Box<dyn ByteSink> },
}

pub struct Session {
    pub peer: SocketAddr,
    pub operation: Operation,
    pub file_name: String,
    pub state: SessionState,
    pub last_seen: PacketKind,
    pub role: Role,
    /// Set once the source/sink side of the transfer is exhausted (sender:
    /// no more chunks; used only to gate `SenderEngine::is_finished`).
    pub source_exhausted: bool,
}

impl Session {
    pub fn new(peer: SocketAddr, operation: Operation, file_name: String, state: SessionState, role: Role) -> Self {
        Self {
            peer,
            operation,
            file_name,
            state,
            last_seen: PacketKind::Init,
            role,
            source_exhausted: false,
        }
    }
}

/// Splits a CLI-supplied file name into the stem/extension pair the INIT
/// packet carries, on the last `.`. A name with no `.` yields an empty
/// extension.
pub fn split_file_name(name: &str) -> (String, String) {
    match name.rsplit_once('.') {
        Some((stem, extension)) => (stem.to_string(), extension.to_string()),
        None => (name.to_string(), String::new()),
    }
}

/// Rejoins a stem/extension pair exactly as the wire protocol encodes it:
/// unconditionally `{stem}.{extension}`, even when `extension` is empty.
/// Preserved from the original implementation for wire compatibility (both
/// peers run this same codec) rather than cleaned up to omit the trailing
/// dot on extension-less names.
pub fn join_file_name(stem: &str, extension: &str) -> String {
    format!("{stem}.{extension}")
}
