//! Output stream abstraction and trivial built-in sinks

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::TtsResult;
use crate::types::{AudioFormat, RunState};

/// Destination for synthesized audio. Device, file, and network sinks all
/// live behind this trait; the pipeline only triggers format changes and
/// transport transitions, it never implements them.
pub trait OutputStream: Send + Sync {
    fn format(&self) -> TtsResult<AudioFormat>;

    /// Renegotiate the stream to a new format. Called before synthesis
    /// when the engine prefers something else and the voice allows it.
    fn set_format(&self, format: &AudioFormat) -> TtsResult<()>;

    /// Returns the number of bytes accepted.
    fn write(&self, data: &[u8]) -> TtsResult<usize>;

    /// Flush whatever the sink buffers.
    fn commit(&self) -> TtsResult<()>;

    /// Streams with a start/stop transport override this; others ignore it.
    fn set_run_state(&self, _state: RunState) -> TtsResult<()> {
        Ok(())
    }

    /// Block until buffered audio has finished playing, if the sink can
    /// tell. The default returns immediately.
    fn wait_until_finished(&self) -> TtsResult<()> {
        Ok(())
    }
}

/// Resolves an output identity (or the system default when `None`) to a
/// concrete stream.
pub trait OutputResolver: Send + Sync {
    fn resolve(&self, output_id: Option<&str>) -> TtsResult<Arc<dyn OutputStream>>;
}

/// Discards audio, counting bytes. The default sink when no device layer
/// is wired up.
pub struct NullOutputStream {
    format: Mutex<AudioFormat>,
    bytes_written: AtomicU64,
}

impl Default for NullOutputStream {
    fn default() -> Self {
        Self::new()
    }
}

impl NullOutputStream {
    pub fn new() -> Self {
        Self {
            format: Mutex::new(AudioFormat::default()),
            bytes_written: AtomicU64::new(0),
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written.load(Ordering::Relaxed)
    }
}

impl OutputStream for NullOutputStream {
    fn format(&self) -> TtsResult<AudioFormat> {
        Ok(*self.format.lock())
    }

    fn set_format(&self, format: &AudioFormat) -> TtsResult<()> {
        *self.format.lock() = *format;
        Ok(())
    }

    fn write(&self, data: &[u8]) -> TtsResult<usize> {
        self.bytes_written
            .fetch_add(data.len() as u64, Ordering::Relaxed);
        Ok(data.len())
    }

    fn commit(&self) -> TtsResult<()> {
        Ok(())
    }
}

/// Captures audio into a shared buffer, for tests and offline rendering.
pub struct MemoryOutputStream {
    format: Mutex<AudioFormat>,
    buffer: Mutex<Vec<u8>>,
    commits: AtomicU64,
}

impl Default for MemoryOutputStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryOutputStream {
    pub fn new() -> Self {
        Self {
            format: Mutex::new(AudioFormat::default()),
            buffer: Mutex::new(Vec::new()),
            commits: AtomicU64::new(0),
        }
    }

    /// Copy of everything written so far.
    pub fn data(&self) -> Vec<u8> {
        self.buffer.lock().clone()
    }

    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Relaxed)
    }
}

impl OutputStream for MemoryOutputStream {
    fn format(&self) -> TtsResult<AudioFormat> {
        Ok(*self.format.lock())
    }

    fn set_format(&self, format: &AudioFormat) -> TtsResult<()> {
        *self.format.lock() = *format;
        Ok(())
    }

    fn write(&self, data: &[u8]) -> TtsResult<usize> {
        self.buffer.lock().extend_from_slice(data);
        Ok(data.len())
    }

    fn commit(&self) -> TtsResult<()> {
        self.commits.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

/// Resolver that hands out a fresh [`NullOutputStream`] for any identity.
pub struct NullOutputResolver;

impl OutputResolver for NullOutputResolver {
    fn resolve(&self, _output_id: Option<&str>) -> TtsResult<Arc<dyn OutputStream>> {
        Ok(Arc::new(NullOutputStream::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_stream_counts_bytes() {
        let stream = NullOutputStream::new();
        stream.write(&[0u8; 128]).unwrap();
        stream.write(&[0u8; 64]).unwrap();
        assert_eq!(stream.bytes_written(), 192);
    }

    #[test]
    fn memory_stream_captures_writes_in_order() {
        let stream = MemoryOutputStream::new();
        stream.write(&[1, 2]).unwrap();
        stream.write(&[3]).unwrap();
        stream.commit().unwrap();
        assert_eq!(stream.data(), vec![1, 2, 3]);
        assert_eq!(stream.commit_count(), 1);
    }

    #[test]
    fn set_format_replaces_the_current_format() {
        let stream = MemoryOutputStream::new();
        let fmt = AudioFormat::new(16_000, 1, 16);
        stream.set_format(&fmt).unwrap();
        assert_eq!(stream.format().unwrap(), fmt);
    }
}
