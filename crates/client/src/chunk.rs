//! Chunk framer over the input stream.
//!
//! Wraps the producer in a buffer sized to one chunk. `peek` fills the
//! buffer to capacity (or EOF) without consuming, and bytes are consumed
//! only after the server acknowledges them, so a failed upload leaves the
//! same bytes in place for the retry pass. This is what makes the upload
//! loop crash-safe with respect to a forward-only, non-seekable stdin.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

pub struct ChunkBuffer<R> {
    reader: R,
    buf: Vec<u8>,
    filled: usize,
    eof: bool,
}

impl<R: AsyncRead + Unpin> ChunkBuffer<R> {
    /// Buffer `reader` with a capacity of exactly one chunk.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        assert!(chunk_size > 0, "chunk size must be positive");
        Self {
            reader,
            buf: vec![0; chunk_size],
            filled: 0,
            eof: false,
        }
    }

    /// Fill the buffer to capacity or end-of-stream and return the buffered
    /// bytes without consuming them. An empty slice means the stream is
    /// exhausted.
    pub async fn peek(&mut self) -> io::Result<&[u8]> {
        while !self.eof && self.filled < self.buf.len() {
            let n = self.reader.read(&mut self.buf[self.filled..]).await?;
            if n == 0 {
                self.eof = true;
            } else {
                self.filled += n;
            }
        }
        Ok(&self.buf[..self.filled])
    }

    /// Drop `n` buffered bytes. Called only for bytes the server has
    /// acknowledged (or that `discard` is skipping).
    pub fn consume(&mut self, n: usize) {
        assert!(n <= self.filled, "cannot consume beyond the buffered bytes");
        self.buf.copy_within(n..self.filled, 0);
        self.filled -= n;
    }

    /// Discard exactly `n` bytes of the stream, refilling as needed. Used
    /// to align the local cursor with the server's `bytes_processed` on
    /// resume; errors if the stream ends first.
    pub async fn discard(&mut self, mut n: u64) -> io::Result<()> {
        while n > 0 {
            let available = self.peek().await?.len();
            if available == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "input ended while skipping already-uploaded bytes",
                ));
            }
            let take = available.min(usize::try_from(n).unwrap_or(usize::MAX));
            self.consume(take);
            n -= take as u64;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_peek_fills_a_whole_chunk() {
        let data = b"abcdefghij".as_slice();
        let mut chunks = ChunkBuffer::new(data, 4);
        assert_eq!(chunks.peek().await.unwrap(), b"abcd");
        // Peeking again returns the same bytes until they are consumed.
        assert_eq!(chunks.peek().await.unwrap(), b"abcd");
    }

    #[tokio::test]
    async fn test_consume_advances_and_final_chunk_is_short() {
        let data = b"abcdefghij".as_slice();
        let mut chunks = ChunkBuffer::new(data, 4);

        assert_eq!(chunks.peek().await.unwrap(), b"abcd");
        chunks.consume(4);
        assert_eq!(chunks.peek().await.unwrap(), b"efgh");
        chunks.consume(4);
        // Last chunk is whatever remains.
        assert_eq!(chunks.peek().await.unwrap(), b"ij");
        chunks.consume(2);
        // End-of-stream is a zero-length peek.
        assert_eq!(chunks.peek().await.unwrap(), b"");
    }

    #[tokio::test]
    async fn test_partial_consume_keeps_remainder_peekable() {
        let data = b"abcdef".as_slice();
        let mut chunks = ChunkBuffer::new(data, 6);
        assert_eq!(chunks.peek().await.unwrap(), b"abcdef");
        chunks.consume(2);
        assert_eq!(chunks.peek().await.unwrap(), b"cdef");
    }

    #[tokio::test]
    async fn test_discard_spans_refills() {
        let data: Vec<u8> = (0..=255u8).collect();
        let mut chunks = ChunkBuffer::new(data.as_slice(), 16);
        chunks.discard(100).await.unwrap();
        assert_eq!(chunks.peek().await.unwrap()[0], 100);
    }

    #[tokio::test]
    async fn test_discard_past_eof_is_an_error() {
        let data = b"short".as_slice();
        let mut chunks = ChunkBuffer::new(data, 4);
        let err = chunks.discard(32).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_empty_input_peeks_empty() {
        let mut chunks = ChunkBuffer::new(b"".as_slice(), 8);
        assert_eq!(chunks.peek().await.unwrap(), b"");
    }
}
