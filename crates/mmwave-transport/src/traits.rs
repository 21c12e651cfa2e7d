use bytes::Bytes;

use crate::error::Result;

/// One opened sensor link: blocking reads and writes with a port timeout.
///
/// Reads follow serial-port semantics: a read that hits the port timeout
/// returns the bytes received so far instead of failing. Callers compare
/// the returned length (or trailing delimiter) with what they asked for.
pub trait ByteSource: Send {
    /// Read up to `n` bytes, blocking until `n` arrive or the timeout expires.
    fn read(&mut self, n: usize) -> Result<Bytes>;

    /// Read up to and including `delimiter`, or whatever arrived before the timeout.
    fn read_until(&mut self, delimiter: &[u8]) -> Result<Bytes>;

    /// Write all of `data` and flush.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Discard pending input and output.
    fn clear(&mut self) -> Result<()>;

    /// Current baud rate of the link.
    fn baud_rate(&self) -> u32;

    /// Change the baud rate of the open link.
    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()>;

    /// Port identifier (device path or test label).
    fn name(&self) -> &str;

    /// Read one newline-terminated line (newline included when present).
    fn read_line(&mut self) -> Result<Bytes> {
        self.read_until(b"\n")
    }
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
    fn read(&mut self, n: usize) -> Result<Bytes> {
        (**self).read(n)
    }

    fn read_until(&mut self, delimiter: &[u8]) -> Result<Bytes> {
        (**self).read_until(delimiter)
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn clear(&mut self) -> Result<()> {
        (**self).clear()
    }

    fn baud_rate(&self) -> u32 {
        (**self).baud_rate()
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        (**self).set_baud_rate(baud_rate)
    }

    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_line(&mut self) -> Result<Bytes> {
        (**self).read_line()
    }
}
