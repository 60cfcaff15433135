//! Narration synthesis for the shorts pipeline.
//!
//! Providers turn a script into an audio file. The [`NarrationChain`] tries
//! them in order and degrades to "no narration" when all of them fail.

pub mod chain;
pub mod command;
pub mod error;
pub mod http;
pub mod provider;

pub use chain::{with_closing_phrase, NarrationChain, NarrationClip};
pub use command::{CommandTtsConfig, CommandTtsProvider};
pub use error::{NarrationError, NarrationResult};
pub use http::{HttpTtsConfig, HttpTtsProvider};
pub use provider::NarrationProvider;
