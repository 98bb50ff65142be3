//! The language-understanding oracle behind every pipeline stage.
//!
//! The oracle is an untrusted text source: stages validate whatever it
//! returns against their own output grammar.

mod api;
mod traits;

pub use api::{from_config, GeminiOracle, OpenAiOracle};
pub use traits::{CompletionRequest, Oracle, ResponsivenessLevel, StageSettings};
