//! Capability interfaces consumed by the voxflow speak pipeline: synthesis
//! engines, output streams, and the token store, plus the shared audio and
//! configuration types.

pub mod engine;
pub mod error;
pub mod registry;
pub mod stream;
pub mod types;

pub use engine::*;
pub use error::*;
pub use registry::*;
pub use stream::*;
pub use types::*;
