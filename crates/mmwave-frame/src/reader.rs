use mmwave_transport::ByteSource;
use tracing::{debug, warn};

use crate::codec::MAGIC;
use crate::decoder::{DecoderConfig, FrameDecoder};
use crate::error::Result;
use crate::types::Frame;

/// Skip input up to and including the next synchronization marker.
///
/// Returns `false` when the source ran dry (timeout or end of capture)
/// before a marker was seen.
pub fn sync<S: ByteSource + ?Sized>(source: &mut S) -> Result<bool> {
    let skipped = source.read_until(&MAGIC)?;
    Ok(skipped.ends_with(&MAGIC))
}

/// Reads complete frames from any `ByteSource`.
///
/// Resynchronizes on the marker before every frame. Recoverable decode
/// faults are logged and the frame dropped; only transport failures reach
/// the caller.
pub struct FrameReader<S> {
    inner: S,
    decoder: FrameDecoder,
    dropped: u64,
}

impl<S: ByteSource> FrameReader<S> {
    /// Create a new frame reader with default decoder configuration.
    pub fn new(inner: S) -> Self {
        Self::with_config(inner, DecoderConfig::default())
    }

    /// Create a new frame reader with explicit decoder configuration.
    pub fn with_config(inner: S, config: DecoderConfig) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(config),
            dropped: 0,
        }
    }

    /// Read the next good frame, or `Ok(None)` once no marker follows.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        loop {
            if !sync(&mut self.inner)? {
                debug!(source = self.inner.name(), "no further marker");
                return Ok(None);
            }

            match self.decoder.decode(&mut self.inner) {
                Ok(frame) => return Ok(Some(frame)),
                Err(err) if err.is_recoverable() => {
                    self.dropped += 1;
                    warn!(error = %err, "dropping frame");
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Number of frames discarded because of decode faults.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ByteSource> Iterator for FrameReader<S> {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame().transpose()
    }
}
