//! Shared data types: conversation messages and model-call parameters.

pub mod call;
pub mod message;

pub use call::{CallKind, CallParams};
pub use message::{ChatMessage, Role};
