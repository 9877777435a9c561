//! The narrow source/sink interfaces the engines consume. Per spec.md §1
//! the filesystem is an external collaborator — "the core sees a
//! byte-producing source and a byte-consuming sink, nothing more" — so these
//! traits, not `std::fs::File` directly, are what the sender/receiver
//! engines are generic over.

use std::io::{self, Read, Write};

use crate::config::MAX_PAYLOAD;

/// Yields contiguous chunks of at most `MAX_PAYLOAD` bytes, in order.
pub trait ByteSource {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>>;
}

/// Consumes chunks in ascending sequence order and can be durably flushed.
pub trait ByteSink {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
}

/// Adapts any `Read` into a `ByteSource` that yields `MAX_PAYLOAD`-sized
/// chunks (the last one possibly shorter).
pub struct ChunkedReader<R> {
    inner: R,
}

impl<R: Read> ChunkedReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }
}

impl<R: Read> ByteSource for ChunkedReader<R> {
    fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; MAX_PAYLOAD];
        let mut filled = 0;

        while filled < buf.len() {
            let n = self.inner.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }

        buf.truncate(filled);
        Ok(Some(buf))
    }
}

/// Adapts any `Write` into a `ByteSink`.
pub struct WriteSink<W> {
    inner: W,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }
}

impl<W: Write> ByteSink for WriteSink<W> {
    fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.inner.write_all(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn chunked_reader_splits_into_max_payload_pieces() {
        let data = vec![7u8; MAX_PAYLOAD * 2 + 5];
        let mut reader = ChunkedReader::new(Cursor::new(data));

        let first = reader.next_chunk().unwrap().unwrap();
        let second = reader.next_chunk().unwrap().unwrap();
        let third = reader.next_chunk().unwrap().unwrap();
        let fourth = reader.next_chunk().unwrap();

        assert_eq!(first.len(), MAX_PAYLOAD);
        assert_eq!(second.len(), MAX_PAYLOAD);
        assert_eq!(third.len(), 5);
        assert_eq!(fourth, None);
    }
}
