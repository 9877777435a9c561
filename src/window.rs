//! Sender-side sliding window bookkeeping, generalized from the teacher's
//! `SequenceWindow` (ack/nack tracking keyed by sequence number) down to the
//! shape spec.md §3 names: a bounded, ordered run of in-flight `WindowItem`s.
//!
//! Stop-and-Wait is Selective Repeat with `window_size = 1` and the flip
//! successor (spec.md §9) — there is exactly one `Window` implementation,
//! parameterised by a successor function rather than duplicated per mode.

use std::collections::VecDeque;

use bytes::Bytes;

use crate::config::Protocol;

pub type Successor = fn(u32) -> u32;

/// 1-bit alternating counter used by Stop-and-Wait.
pub fn flip_successor(seq: u32) -> u32 {
    seq ^ 1
}

/// Monotonically increasing counter used by Selective Repeat.
pub fn increment_successor(seq: u32) -> u32 {
    seq.wrapping_add(1)
}

pub fn successor_for(protocol: Protocol) -> Successor {
    match protocol {
        Protocol::StopAndWait => flip_successor,
        Protocol::SelectiveRepeat => increment_successor,
    }
}

/// A single in-flight packet tracked by the sender.
#[derive(Debug, Clone)]
pub struct WindowItem {
    pub sequence: u32,
    pub payload: Bytes,
    pub acked: bool,
    pub retries_remaining: u32,
}

/// Ordered, bounded run of `WindowItem`s. `base` is always the sequence
/// number of the head item (or the next sequence to be sent, if empty).
pub struct Window {
    items: VecDeque<WindowItem>,
    capacity: usize,
    retries_remaining: u32,
}

impl Window {
    pub fn new(capacity: usize, retries_remaining: u32) -> Self {
        Self { items: VecDeque::with_capacity(capacity), capacity, retries_remaining }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_room(&self) -> bool {
        self.items.len() < self.capacity
    }

    /// Appends a new, not-yet-acked item. Caller is responsible for ensuring
    /// `sequence` is strictly greater than any existing item's sequence.
    pub fn push(&mut self, sequence: u32, payload: impl Into<Bytes>) {
        self.items.push_back(WindowItem {
            sequence,
            payload: payload.into(),
            acked: false,
            retries_remaining: self.retries_remaining,
        });
    }

    pub fn base(&self) -> Option<u32> {
        self.items.front().map(|item| item.sequence)
    }

    pub fn get_mut(&mut self, sequence: u32) -> Option<&mut WindowItem> {
        self.items.iter_mut().find(|item| item.sequence == sequence)
    }

    /// Marks `sequence` acked. Returns `false` if no such item is in the
    /// window (an out-of-window ACK, which the caller should log and
    /// discard rather than treat as progress).
    pub fn mark_acked(&mut self, sequence: u32) -> bool {
        match self.get_mut(sequence) {
            Some(item) => {
                item.acked = true;
                true
            }
            None => false,
        }
    }

    /// Removes the head item and every subsequent already-acked item,
    /// stopping at the first un-acked one. Returns the number removed.
    pub fn slide(&mut self) -> usize {
        let mut removed = 0;
        while matches!(self.items.front(), Some(item) if item.acked) {
            self.items.pop_front();
            removed += 1;
        }
        removed
    }

    pub fn iter(&self) -> impl Iterator<Item = &WindowItem> {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flip_alternates_between_zero_and_one() {
        assert_eq!(flip_successor(0), 1);
        assert_eq!(flip_successor(1), 0);
    }

    #[test]
    fn increment_is_monotonic() {
        assert_eq!(increment_successor(0), 1);
        assert_eq!(increment_successor(41), 42);
    }

    #[test]
    fn slide_stops_at_first_unacked() {
        let mut w = Window::new(4, 4);
        w.push(0, Vec::<u8>::new());
        w.push(1, Vec::<u8>::new());
        w.push(2, Vec::<u8>::new());

        w.mark_acked(0);
        w.mark_acked(1);

        assert_eq!(w.slide(), 2);
        assert_eq!(w.base(), Some(2));
        assert_eq!(w.len(), 1);
    }

    #[test]
    fn out_of_window_ack_is_reported() {
        let mut w = Window::new(4, 4);
        w.push(0, Vec::<u8>::new());
        assert!(!w.mark_acked(99));
        assert!(w.mark_acked(0));
    }

    #[test]
    fn has_room_respects_capacity() {
        let mut w = Window::new(2, 4);
        assert!(w.has_room());
        w.push(0, Vec::<u8>::new());
        assert!(w.has_room());
        w.push(1, Vec::<u8>::new());
        assert!(!w.has_room());
    }
}
