//! Synthesis engine abstraction and the per-task callback site

use std::sync::Arc;

use crate::error::TtsResult;
use crate::types::{AudioFormat, EngineActions, TextFragment};

/// Callback surface handed to an engine for the duration of one speak
/// task. The single-worker queue guarantees at most one site is active per
/// voice at a time, so the clear-on-read calls below cannot race between
/// tasks.
pub trait EngineSite: Send + Sync {
    /// Snapshot of the control bits. Long-running engines poll this and
    /// return early when ABORT is set.
    fn actions(&self) -> EngineActions;

    /// Current speaking rate; clears RATE_CHANGED.
    fn rate(&self) -> i32;

    /// Current volume; clears VOLUME_CHANGED.
    fn volume(&self) -> u16;

    /// Forward synthesized audio to the bound output stream.
    fn write(&self, data: &[u8]) -> TtsResult<usize>;

    /// Identifier of the speak request this site belongs to.
    fn stream_id(&self) -> u32;
}

/// A synthesis engine. `synthesize` blocks on the queue worker for the
/// duration of one fragment and calls back into the site as it goes.
pub trait SynthesisEngine: Send + Sync {
    /// Propose the closest format this engine can produce to `requested`.
    fn preferred_format(&self, requested: &AudioFormat) -> TtsResult<AudioFormat>;

    /// Render one fragment. Audio goes out through `site.write`;
    /// `site.actions` must be polled cooperatively during long synthesis.
    fn synthesize(
        &self,
        format: &AudioFormat,
        fragment: &TextFragment,
        site: &dyn EngineSite,
    ) -> TtsResult<()>;
}

/// Produces engine instances from resolved voice identities. Instantiation
/// is assumed expensive; callers cache the result per identity.
pub trait EngineResolver: Send + Sync {
    fn instantiate(&self, voice_id: &str) -> TtsResult<Arc<dyn SynthesisEngine>>;
}
