use std::time::Duration;

/// Maximum size of a single UDP datagram this crate will ever send.
pub const BUFSIZE: usize = 1500;

/// Field separator used by the textual wire framing.
pub const SEPARATOR: &str = "|";

/// Largest overhead a DATA packet header can add ahead of the payload:
/// tag (1) + '|' + sequence digits (10) + '|' + checksum digits (3) + '|'.
/// Conservative so `MAX_PAYLOAD` never has to be recomputed per packet.
const DATA_HEADER_OVERHEAD: usize = 1 + 1 + 10 + 1 + 3 + 1;

/// Maximum payload bytes carried in a single DATA packet.
pub const MAX_PAYLOAD: usize = BUFSIZE - DATA_HEADER_OVERHEAD;

/// Default host clients and the server bind/connect to when unspecified.
pub const DEFAULT_HOST: &str = "localhost";

/// Default UDP port.
pub const DEFAULT_PORT: u16 = 8080;

/// Per-ACK timeout before the window head is presumed lost and retransmitted.
pub const T_ACK: Duration = Duration::from_secs(10);

/// Maximum number of resends for a given packet before the session fails.
pub const MAX_TRIES: u32 = 5;

/// Default Selective Repeat window length.
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Per-`WindowItem` retry budget, decremented by NAK-driven retransmits.
pub const DEFAULT_RETRIES_REMAINING: u32 = 4;

/// ARQ strategy selected on the CLI (`--protocol {0|1}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    StopAndWait = 0,
    SelectiveRepeat = 1,
}

impl Protocol {
    pub fn window_size(&self) -> usize {
        match self {
            Protocol::StopAndWait => 1,
            Protocol::SelectiveRepeat => DEFAULT_WINDOW_SIZE,
        }
    }
}

impl TryFrom<u8> for Protocol {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Protocol::StopAndWait),
            1 => Ok(Protocol::SelectiveRepeat),
            other => Err(format!("unknown protocol id {other}, expected 0 or 1")),
        }
    }
}
