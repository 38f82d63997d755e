pub mod error;
pub mod queue;

pub use error::*;
pub use queue::*;
