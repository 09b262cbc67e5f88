//! Audio output backends for romtune.

mod cpal_backend;
mod traits;

pub use cpal_backend::{CpalOutput, BUFFER_MS};
pub use traits::{AudioError, AudioOutput};
