//! Per-task engine callback object

use std::sync::Arc;

use voxflow_tts::{EngineActions, EngineSite, TtsError, TtsResult};

use crate::voice::VoiceShared;

/// Capability object handed to the engine for one speak task. Holds a
/// strong back-reference to the shared voice state, so live rate/volume
/// reads and audio writes stay valid for the site's whole lifetime.
pub struct VoiceSite {
    shared: Arc<VoiceShared>,
    stream_id: u32,
}

impl VoiceSite {
    pub(crate) fn new(shared: Arc<VoiceShared>, stream_id: u32) -> Self {
        Self { shared, stream_id }
    }
}

impl EngineSite for VoiceSite {
    fn actions(&self) -> EngineActions {
        self.shared.state.lock().actions
    }

    fn rate(&self) -> i32 {
        let mut state = self.shared.state.lock();
        state.actions.remove(EngineActions::RATE_CHANGED);
        state.rate
    }

    fn volume(&self) -> u16 {
        let mut state = self.shared.state.lock();
        state.actions.remove(EngineActions::VOLUME_CHANGED);
        state.volume
    }

    fn write(&self, data: &[u8]) -> TtsResult<usize> {
        // Take a reference out of the lock, then write unlocked: the sink
        // may block and setters must stay responsive meanwhile.
        let output = self.shared.state.lock().output.clone();
        match output {
            Some(output) => output.write(data),
            None => Err(TtsError::NotInitialized),
        }
    }

    fn stream_id(&self) -> u32 {
        self.stream_id
    }
}
