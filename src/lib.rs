//! Reliable file transfer over UDP: two ARQ strategies (Stop-and-Wait,
//! Selective Repeat) sharing one sender/receiver engine, a textual packet
//! codec, and a single-threaded server dispatcher multiplexing sessions by
//! peer address.

pub mod client;
pub mod codec;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod io_chunks;
pub mod server;
pub mod session;
pub mod window;

pub use error::{Result, TransferError};
