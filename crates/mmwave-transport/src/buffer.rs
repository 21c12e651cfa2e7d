use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};

use crate::error::{Result, TransportError};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 4 * 1024;

/// Upper bound on bytes buffered while scanning for a delimiter.
pub(crate) const MAX_SCAN_BYTES: usize = 1024 * 1024;

/// Buffered reads over any `Read` stream with serial timeout semantics.
///
/// A timed-out or empty read ends the current request with whatever has
/// been buffered so far; callers see a short result rather than an error.
/// A `read_until` that misses holds back any tail that may start the
/// delimiter, so a marker split across reads is still found next time.
pub(crate) struct ReadBuffer {
    buf: BytesMut,
}

impl ReadBuffer {
    pub(crate) fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    pub(crate) fn read<R: Read + ?Sized>(&mut self, inner: &mut R, n: usize) -> Result<Bytes> {
        while self.buf.len() < n {
            if self.fill(inner)? == 0 {
                break;
            }
        }
        let take = n.min(self.buf.len());
        Ok(self.buf.split_to(take).freeze())
    }

    pub(crate) fn read_until<R: Read + ?Sized>(
        &mut self,
        inner: &mut R,
        delimiter: &[u8],
    ) -> Result<Bytes> {
        let mut searched = 0usize;
        loop {
            if let Some(end) = find(&self.buf, delimiter, searched) {
                return Ok(self.buf.split_to(end).freeze());
            }
            searched = self
                .buf
                .len()
                .saturating_sub(delimiter.len().saturating_sub(1));

            if self.buf.len() >= MAX_SCAN_BYTES || self.fill(inner)? == 0 {
                let end = self.buf.len() - partial_match_len(&self.buf, delimiter);
                return Ok(self.buf.split_to(end).freeze());
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.buf.clear();
    }

    fn fill<R: Read + ?Sized>(&mut self, inner: &mut R) -> Result<usize> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];
        loop {
            match inner.read(&mut chunk) {
                Ok(n) => {
                    self.buf.extend_from_slice(&chunk[..n]);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::TimedOut || err.kind() == ErrorKind::WouldBlock =>
                {
                    return Ok(0)
                }
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }
}

/// End offset (exclusive) of the first `delimiter` at or after `from`.
fn find(haystack: &[u8], delimiter: &[u8], from: usize) -> Option<usize> {
    if delimiter.is_empty() {
        return Some(from.min(haystack.len()));
    }
    haystack
        .get(from..)?
        .windows(delimiter.len())
        .position(|window| window == delimiter)
        .map(|pos| from + pos + delimiter.len())
}

/// Length of the longest tail of `haystack` that is a proper prefix of `delimiter`.
pub(crate) fn partial_match_len(haystack: &[u8], delimiter: &[u8]) -> usize {
    let max = delimiter.len().saturating_sub(1).min(haystack.len());
    (1..=max)
        .rev()
        .find(|&n| haystack[haystack.len() - n..] == delimiter[..n])
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn read_exact_count() {
        let mut src = Cursor::new(b"abcdef".to_vec());
        let mut buf = ReadBuffer::new();

        assert_eq!(buf.read(&mut src, 4).unwrap().as_ref(), b"abcd");
        assert_eq!(buf.read(&mut src, 4).unwrap().as_ref(), b"ef");
        assert!(buf.read(&mut src, 4).unwrap().is_empty());
    }

    #[test]
    fn read_until_includes_delimiter() {
        let mut src = Cursor::new(b"Done\nnext\n".to_vec());
        let mut buf = ReadBuffer::new();

        assert_eq!(buf.read_until(&mut src, b"\n").unwrap().as_ref(), b"Done\n");
        assert_eq!(buf.read_until(&mut src, b"\n").unwrap().as_ref(), b"next\n");
    }

    #[test]
    fn read_until_returns_partial_on_eof() {
        let mut src = Cursor::new(b"no newline".to_vec());
        let mut buf = ReadBuffer::new();

        assert_eq!(
            buf.read_until(&mut src, b"\n").unwrap().as_ref(),
            b"no newline"
        );
    }

    #[test]
    fn delimiter_split_across_reads() {
        let mut src = ByteByByteReader {
            bytes: b"xx\x02\x01\x04\x03yy".to_vec(),
            pos: 0,
        };
        let mut buf = ReadBuffer::new();

        let got = buf.read_until(&mut src, &[0x02, 0x01, 0x04, 0x03]).unwrap();
        assert_eq!(got.as_ref(), b"xx\x02\x01\x04\x03");
        assert_eq!(buf.read(&mut src, 2).unwrap().as_ref(), b"yy");
    }

    #[test]
    fn partial_delimiter_held_back_on_miss() {
        let marker = [0x02, 0x01, 0x04, 0x03];
        let mut buf = ReadBuffer::new();

        let mut first = Cursor::new(b"noise\x02\x01".to_vec());
        assert_eq!(buf.read_until(&mut first, &marker).unwrap().as_ref(), b"noise");

        let mut second = Cursor::new(b"\x04\x03yy".to_vec());
        assert_eq!(
            buf.read_until(&mut second, &marker).unwrap().as_ref(),
            b"\x02\x01\x04\x03"
        );
        assert_eq!(buf.read(&mut second, 2).unwrap().as_ref(), b"yy");
    }

    #[test]
    fn partial_match_lengths() {
        let marker = [0x02, 0x01, 0x04, 0x03];
        assert_eq!(partial_match_len(b"abc", &marker), 0);
        assert_eq!(partial_match_len(b"abc\x02", &marker), 1);
        assert_eq!(partial_match_len(b"\x02\x02", &marker), 1);
        assert_eq!(partial_match_len(b"x\x02\x01\x04", &marker), 3);
        assert_eq!(partial_match_len(b"\x02\x01\x04\x03", &marker), 0);
        assert_eq!(partial_match_len(b"tail", b"\n"), 0);
    }

    #[test]
    fn timeout_ends_read_with_partial_data() {
        let mut src = DataThenTimeout {
            data: Some(b"Do".to_vec()),
        };
        let mut buf = ReadBuffer::new();

        assert_eq!(buf.read(&mut src, 8).unwrap().as_ref(), b"Do");
    }

    #[test]
    fn interrupted_read_retries() {
        let mut src = InterruptedThenData {
            state: 0,
            bytes: b"ok".to_vec(),
        };
        let mut buf = ReadBuffer::new();

        assert_eq!(buf.read(&mut src, 2).unwrap().as_ref(), b"ok");
    }

    #[test]
    fn hard_io_error_propagates() {
        let mut src = BrokenReader;
        let mut buf = ReadBuffer::new();

        let err = buf.read(&mut src, 1).unwrap_err();
        assert!(matches!(err, TransportError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn clear_drops_buffered_bytes() {
        let mut src = Cursor::new(b"line one\nline two\n".to_vec());
        let mut buf = ReadBuffer::new();

        buf.read(&mut src, 1).unwrap();
        buf.clear();
        assert!(buf.read(&mut src, 4).unwrap().is_empty());
    }

    #[test]
    fn find_respects_offset() {
        assert_eq!(find(b"a\nb\n", b"\n", 0), Some(2));
        assert_eq!(find(b"a\nb\n", b"\n", 2), Some(4));
        assert_eq!(find(b"abc", b"\n", 0), None);
    }

    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct DataThenTimeout {
        data: Option<Vec<u8>>,
    }

    impl Read for DataThenTimeout {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            match self.data.take() {
                Some(data) => {
                    buf[..data.len()].copy_from_slice(&data);
                    Ok(data.len())
                }
                None => Err(std::io::Error::from(ErrorKind::TimedOut)),
            }
        }
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = self.bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[..n]);
            self.bytes.drain(..n);
            Ok(n)
        }
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::from(ErrorKind::BrokenPipe))
        }
    }
}
