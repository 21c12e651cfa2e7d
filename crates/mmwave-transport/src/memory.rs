use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bytes::{Buf, Bytes, BytesMut};

use crate::buffer::{partial_match_len, MAX_SCAN_BYTES};
use crate::error::{Result, TransportError};
use crate::traits::ByteSource;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

/// In-memory scripted link for tests and offline capture replay.
///
/// Clones share one buffer, so a test can keep a handle while the session
/// owns another. Reads never block: an empty buffer behaves like a port
/// timeout and yields whatever is available.
#[derive(Clone)]
pub struct MemorySource {
    name: String,
    inner: Arc<Mutex<MemoryInner>>,
}

struct MemoryInner {
    input: BytesMut,
    written: Vec<u8>,
    responder: Option<Responder>,
    baud_rate: u32,
    clears: usize,
    closed: bool,
}

impl MemorySource {
    /// Create an empty link with the given label and baud rate.
    pub fn new(name: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(MemoryInner {
                input: BytesMut::new(),
                written: Vec::new(),
                responder: None,
                baud_rate,
                clears: 0,
                closed: false,
            })),
        }
    }

    /// Create a link pre-loaded with readable bytes.
    pub fn from_bytes(name: impl Into<String>, data: impl AsRef<[u8]>) -> Self {
        let source = Self::new(name, 0);
        source.inject(data);
        source
    }

    /// Install a closure that answers every `write` with bytes to be read back.
    pub fn with_responder<F>(self, responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        self.lock().responder = Some(Box::new(responder));
        self
    }

    /// Queue bytes for subsequent reads.
    pub fn inject(&self, data: impl AsRef<[u8]>) {
        self.lock().input.extend_from_slice(data.as_ref());
    }

    /// Everything written to the link so far.
    pub fn written(&self) -> Vec<u8> {
        self.lock().written.clone()
    }

    /// Bytes still waiting to be read.
    pub fn pending(&self) -> usize {
        self.lock().input.len()
    }

    /// How many times `clear` was called.
    pub fn clear_count(&self) -> usize {
        self.lock().clears
    }

    /// Make every further operation fail as if the device vanished.
    pub fn close(&self) {
        self.lock().closed = true;
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_inner(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        let inner = self.lock();
        if inner.closed {
            return Err(TransportError::Closed);
        }
        Ok(inner)
    }
}

impl ByteSource for MemorySource {
    fn read(&mut self, n: usize) -> Result<Bytes> {
        let mut inner = self.open_inner()?;
        let take = n.min(inner.input.len());
        Ok(inner.input.split_to(take).freeze())
    }

    fn read_until(&mut self, delimiter: &[u8]) -> Result<Bytes> {
        let mut inner = self.open_inner()?;
        let end = if delimiter.is_empty() {
            0
        } else {
            inner
                .input
                .windows(delimiter.len())
                .position(|window| window == delimiter)
                .map(|pos| pos + delimiter.len())
                .unwrap_or_else(|| {
                    let len = inner.input.len();
                    if len > MAX_SCAN_BYTES {
                        MAX_SCAN_BYTES
                    } else {
                        len - partial_match_len(&inner.input, delimiter)
                    }
                })
        };
        Ok(inner.input.split_to(end).freeze())
    }

    fn write(&mut self, data: &[u8]) -> Result<()> {
        let mut inner = self.open_inner()?;
        inner.written.extend_from_slice(data);
        if let Some(responder) = inner.responder.as_mut() {
            let reply = responder(data);
            inner.input.extend_from_slice(&reply);
        }
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let mut inner = self.open_inner()?;
        let pending = inner.input.len();
        inner.input.advance(pending);
        inner.clears += 1;
        Ok(())
    }

    fn baud_rate(&self) -> u32 {
        self.lock().baud_rate
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<()> {
        if baud_rate == 0 {
            return Err(TransportError::InvalidBaudRate(baud_rate));
        }
        self.open_inner()?.baud_rate = baud_rate;
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for MemorySource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemorySource")
            .field("name", &self.name)
            .field("baud_rate", &inner.baud_rate)
            .field("pending", &inner.input.len())
            .finish()
    }
}
