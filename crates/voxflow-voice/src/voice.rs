//! The voice orchestrator
//!
//! Owns engine selection and caching, output-stream binding, the mutable
//! parameter set (rate, volume, action flags, stream counter), and the
//! public speak/purge/wait operations. Speak requests become tasks on a
//! dedicated single-worker queue; `speak_proc` is the task body that
//! drives one synthesis call.

use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::bounded;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

use voxflow_foundation::{TaskQueue, WaitOutcome};
use voxflow_tts::{
    EngineActions, EngineResolver, EngineSite, OutputResolver, OutputStream, RunState, SpeakFlags,
    SynthesisEngine, TextFragment, TokenCategory, TokenStore, TtsError, TtsResult, VoiceConfig,
};

use crate::site::VoiceSite;

/// Mutable voice state. One lock guards all of it; the lock is never held
/// across queue waits, engine calls, or blocking stream operations.
pub(crate) struct VoiceState {
    pub(crate) output: Option<Arc<dyn OutputStream>>,
    pub(crate) allow_format_changes: bool,
    /// Resolved identity of the selected voice. Changing it invalidates
    /// the cached engine.
    pub(crate) voice_id: Option<String>,
    /// Cached engine instance; construction is expensive and must not be
    /// repeated while the voice identity stays the same.
    pub(crate) engine: Option<Arc<dyn SynthesisEngine>>,
    pub(crate) actions: EngineActions,
    pub(crate) rate: i32,
    pub(crate) volume: u16,
    pub(crate) stream_counter: u32,
}

pub(crate) struct VoiceShared {
    pub(crate) state: Mutex<VoiceState>,
}

/// Where a voice sends its audio.
pub enum OutputTarget {
    /// Resolve the system default output.
    Default,
    /// Resolve a selector token through the token store.
    Token(String),
    /// Use this stream as-is.
    Stream(Arc<dyn OutputStream>),
}

/// A text-to-speech voice: a serialized speak pipeline over injected
/// engine, output, and token-store collaborators.
///
/// All methods take `&self`; the voice can be shared across threads.
/// Dropping the voice stops the queue worker first.
pub struct Voice {
    shared: Arc<VoiceShared>,
    queue: TaskQueue,
    engines: Arc<dyn EngineResolver>,
    outputs: Arc<dyn OutputResolver>,
    tokens: Arc<dyn TokenStore>,
    /// Configured fallback voice token, consulted before the store's
    /// category default.
    default_voice: Option<String>,
}

impl Voice {
    pub fn new(
        engines: Arc<dyn EngineResolver>,
        outputs: Arc<dyn OutputResolver>,
        tokens: Arc<dyn TokenStore>,
    ) -> Self {
        Self {
            shared: Arc::new(VoiceShared {
                state: Mutex::new(VoiceState {
                    output: None,
                    allow_format_changes: true,
                    voice_id: None,
                    engine: None,
                    actions: EngineActions::CONTINUE,
                    rate: 0,
                    volume: 100,
                    stream_counter: 0,
                }),
            }),
            queue: TaskQueue::named("speak-queue"),
            engines,
            outputs,
            tokens,
            default_voice: None,
        }
    }

    pub fn with_config(mut self, config: VoiceConfig) -> Self {
        {
            let mut state = self.shared.state.lock();
            state.rate = config.rate;
            state.volume = config.volume.min(100);
        }
        self.default_voice = config.default_voice;
        self
    }

    // ─── Parameters ─────────────────────────────────────────────────

    /// Set the speaking rate. Visible to the in-flight task on its next
    /// poll, not retroactively.
    pub fn set_rate(&self, rate: i32) {
        let mut state = self.shared.state.lock();
        state.rate = rate;
        state.actions.insert(EngineActions::RATE_CHANGED);
    }

    pub fn rate(&self) -> i32 {
        self.shared.state.lock().rate
    }

    pub fn set_volume(&self, volume: u16) -> TtsResult<()> {
        if volume > 100 {
            return Err(TtsError::InvalidArgument(format!(
                "volume {volume} out of range 0..=100"
            )));
        }
        let mut state = self.shared.state.lock();
        state.volume = volume;
        state.actions.insert(EngineActions::VOLUME_CHANGED);
        Ok(())
    }

    pub fn volume(&self) -> u16 {
        self.shared.state.lock().volume
    }

    // ─── Output and voice selection ─────────────────────────────────

    /// Bind an output stream, resolving tokens through the store. Starts
    /// the task queue if it is not running yet. The previous stream
    /// reference is released by the swap.
    pub fn set_output(&self, target: OutputTarget, allow_format_changes: bool) -> TtsResult<()> {
        let stream = match target {
            OutputTarget::Stream(stream) => stream,
            OutputTarget::Token(token) => {
                let id = self.tokens.lookup(TokenCategory::AudioOutput, &token)?;
                self.outputs.resolve(Some(&id))?
            }
            OutputTarget::Default => {
                // The store may not have a default registered; the
                // resolver then decides what the system default is.
                let id = self.tokens.default_id(TokenCategory::AudioOutput).ok();
                self.outputs.resolve(id.as_deref())?
            }
        };
        self.queue.start()?;
        let mut state = self.shared.state.lock();
        state.allow_format_changes = allow_format_changes;
        state.output = Some(stream);
        Ok(())
    }

    /// Select a voice by token, or the default when `None`. Selecting the
    /// already-active identity keeps the cached engine instance; anything
    /// else clears it so the next speak re-instantiates.
    pub fn set_voice(&self, token: Option<&str>) -> TtsResult<()> {
        let id = self.resolve_voice_id(token)?;
        let mut state = self.shared.state.lock();
        if state.voice_id.as_deref() == Some(id.as_str()) {
            return Ok(());
        }
        debug!(voice = %id, "switching voice");
        state.voice_id = Some(id);
        state.engine = None;
        Ok(())
    }

    /// Identity of the selected voice, resolving and caching the default
    /// on first query if none was ever set.
    pub fn voice(&self) -> TtsResult<String> {
        {
            let state = self.shared.state.lock();
            if let Some(id) = &state.voice_id {
                return Ok(id.clone());
            }
        }
        let id = self.resolve_voice_id(None)?;
        let mut state = self.shared.state.lock();
        // A concurrent set_voice may have won; keep whatever is there.
        Ok(state.voice_id.get_or_insert(id).clone())
    }

    fn resolve_voice_id(&self, token: Option<&str>) -> TtsResult<String> {
        match token {
            Some(token) => self.tokens.lookup(TokenCategory::Voices, token),
            None => match &self.default_voice {
                Some(token) => self.tokens.lookup(TokenCategory::Voices, token),
                None => self.tokens.default_id(TokenCategory::Voices),
            },
        }
    }

    // ─── Speak ──────────────────────────────────────────────────────

    /// Queue one speak request and return its stream id.
    ///
    /// With `SpeakFlags::ASYNC` the call returns as soon as the task is
    /// queued; a later failure is only observable in the logs. Without it
    /// the call blocks until the task completes and returns its result.
    /// `SpeakFlags::PURGE_BEFORE_SPEAK` first discards queued requests and
    /// asks the running one to abort; combined with empty text this is a
    /// purge-only call returning stream id 0.
    pub fn speak(&self, text: Option<&str>, flags: SpeakFlags) -> TtsResult<u32> {
        if flags.contains(SpeakFlags::PURGE_BEFORE_SPEAK) {
            self.purge();
            if text.map_or(true, str::is_empty) {
                return Ok(0);
            }
        }
        let text =
            text.ok_or_else(|| TtsError::InvalidArgument("speak called with no text".into()))?;

        self.ensure_output()?;
        let engine = self.ensure_engine()?;

        let stream_id = {
            let mut state = self.shared.state.lock();
            state.stream_counter += 1;
            state.stream_counter
        };

        let site = VoiceSite::new(self.shared.clone(), stream_id);
        let fragment = TextFragment::new(text);
        let shared = self.shared.clone();

        let synchronous = !flags.contains(SpeakFlags::ASYNC);
        let (done_tx, done_rx) = if synchronous {
            let (tx, rx) = bounded::<TtsResult<()>>(1);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        debug!(stream_id, synchronous, "queueing speak request");
        self.queue.submit(Box::new(move || {
            let result = speak_proc(&shared, engine.as_ref(), &fragment, &site);
            if let Err(e) = &result {
                // The one place an asynchronous caller gets any feedback.
                error!(stream_id = site.stream_id(), error = %e, "speak task failed");
            }
            if let Some(tx) = done_tx {
                let _ = tx.send(result);
            }
        }))?;

        match done_rx {
            None => Ok(stream_id),
            Some(rx) => match rx.recv() {
                Ok(result) => result.map(|()| stream_id),
                // The sender was dropped without a result: the task was
                // purged before it ran. A purge is always successful from
                // the caller's point of view.
                Err(_) => Ok(stream_id),
            },
        }
    }

    /// Block until every queued request has finished, or `timeout`
    /// elapses (`None` waits indefinitely).
    ///
    /// This reports queue-empty, not "this specific stream finished"; the
    /// two coincide only while no new speak calls race in.
    pub fn wait_until_done(&self, timeout: Option<Duration>) -> WaitOutcome {
        self.queue.wait_until_empty(timeout)
    }

    /// Ask the in-flight task to abort and discard everything pending.
    fn purge(&self) {
        let output = {
            let mut state = self.shared.state.lock();
            state.actions.insert(EngineActions::ABORT);
            state.output.clone()
        };
        if let Some(output) = output {
            // Best effort: a stoppable output cuts buffered audio short.
            if let Err(e) = output.set_run_state(RunState::Stopped) {
                warn!(error = %e, "output stream refused to stop during purge");
            }
        }
        self.queue.purge_pending();
        let mut state = self.shared.state.lock();
        state.actions.remove(EngineActions::ABORT);
    }

    fn ensure_output(&self) -> TtsResult<()> {
        if self.shared.state.lock().output.is_some() {
            return Ok(());
        }
        self.set_output(OutputTarget::Default, true)
    }

    fn ensure_engine(&self) -> TtsResult<Arc<dyn SynthesisEngine>> {
        if let Some(engine) = self.shared.state.lock().engine.clone() {
            return Ok(engine);
        }
        let voice_id = self.voice()?;
        // Instantiate outside the lock; engine construction may be slow.
        let engine = self.engines.instantiate(&voice_id)?;
        let mut state = self.shared.state.lock();
        Ok(state.engine.get_or_insert(engine).clone())
    }
}

impl Drop for Voice {
    fn drop(&mut self) {
        // Stop the worker before the voice state goes away.
        self.queue.cancel();
    }
}

/// Task body driving one synthesis call, executed on the queue worker.
fn speak_proc(
    shared: &VoiceShared,
    engine: &dyn SynthesisEngine,
    fragment: &TextFragment,
    site: &VoiceSite,
) -> TtsResult<()> {
    let (output, allow_format_changes) = {
        let mut state = shared.state.lock();
        if state.actions.contains(EngineActions::ABORT) {
            // A purge raced with this queued task; completing with no
            // audio is the intended outcome, not an error.
            debug!(stream_id = site.stream_id(), "speak task aborted before start");
            return Ok(());
        }
        // Make the engine pick up the current rate and volume at the
        // start of this task.
        state
            .actions
            .insert(EngineActions::RATE_CHANGED | EngineActions::VOLUME_CHANGED);
        let output = state.output.clone().ok_or(TtsError::NotInitialized)?;
        (output, state.allow_format_changes)
    };

    let current = output.format()?;
    let negotiated = engine.preferred_format(&current)?;
    let format = if negotiated != current && allow_format_changes {
        debug!(
            stream_id = site.stream_id(),
            from = ?current,
            to = ?negotiated,
            "renegotiating output format"
        );
        output.set_format(&negotiated)?;
        negotiated
    } else {
        // Either the formats already agree or the voice pins the stream
        // format; the engine renders into the stream's current format.
        current
    };

    output.set_run_state(RunState::Running)?;

    engine.synthesize(&format, fragment, site)?;

    output.commit()?;
    output.wait_until_finished()?;
    Ok(())
}
