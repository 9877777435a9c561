//! The ARQ core: one sender engine and one receiver engine, each
//! parameterised by `(window_size, successor_fn)` rather than duplicated per
//! protocol (spec.md §9). Stop-and-Wait is Selective Repeat with
//! `window_size = 1` and the flip successor; there is exactly one engine of
//! each kind.
//!
//! Both engines expose small, non-blocking transition methods
//! (`fill_window`/`handle_ack`/... and `handle_data`/`handle_fin`/...) so the
//! server dispatcher can drive many sessions from one event loop, plus a
//! `send_all`/`receive_all` convenience loop used by the single-threaded
//! client driver.

mod receiver;
mod sender;

pub use receiver::ReceiverEngine;
pub use sender::SenderEngine;
