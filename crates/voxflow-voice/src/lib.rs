//! # Voice orchestration
//!
//! A [`Voice`] owns a single-worker task queue and executes speak requests
//! strictly in submission order. Callers may block until a request
//! finishes or fire it asynchronously; pending requests can be purged and
//! the in-flight one cooperatively aborted. Engine, output stream, and
//! token store implementations are injected through the `voxflow-tts`
//! capability traits.

pub mod site;
pub mod voice;

pub use site::VoiceSite;
pub use voice::{OutputTarget, Voice};
