//! Core types shared across the speak pipeline

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// PCM audio format carried between an engine and an output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Bytes per second of audio in this format, for sizing buffers.
    pub fn bytes_per_second(&self) -> u32 {
        self.sample_rate * self.channels as u32 * (self.bits_per_sample as u32 / 8)
    }
}

bitflags! {
    /// Cooperative control bits an engine polls during synthesis.
    ///
    /// ABORT is a request, not a guarantee: the engine is expected to
    /// observe it on its next poll and return early. The *_CHANGED bits
    /// are cleared by the read that consumes them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(transparent)]
    pub struct EngineActions: u32 {
        /// Stop synthesizing and return as soon as practical.
        const ABORT = 0b0001;
        /// The rate changed since the engine last read it.
        const RATE_CHANGED = 0b0010;
        /// The volume changed since the engine last read it.
        const VOLUME_CHANGED = 0b0100;
    }
}

impl EngineActions {
    /// No pending request; keep going.
    pub const CONTINUE: Self = Self::empty();
}

bitflags! {
    /// Per-call speak options.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    #[repr(transparent)]
    pub struct SpeakFlags: u32 {
        /// Queue the request and return immediately instead of blocking
        /// until synthesis completes.
        const ASYNC = 0b0001;
        /// Discard queued requests and ask the in-flight one to abort
        /// before handling this call.
        const PURGE_BEFORE_SPEAK = 0b0010;
    }
}

/// Transport state for output streams that support one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Stopped,
    Running,
}

/// One already-expanded synthesis fragment. Markup parsing happens
/// upstream; engines receive plain text.
#[derive(Debug, Clone)]
pub struct TextFragment {
    pub text: String,
}

impl TextFragment {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Initial voice parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceConfig {
    /// Voice selector token used when no voice is set explicitly. `None`
    /// falls back to the token store's category default.
    pub default_voice: Option<String>,
    /// Speaking rate; callers conventionally use -1000..=1000 with 0 as
    /// the voice's natural rate.
    pub rate: i32,
    /// Volume, 0..=100.
    pub volume: u16,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            default_voice: None,
            rate: 0,
            volume: 100,
        }
    }
}
