//! Test helpers shared across Callboard crates.

pub mod observer;
pub mod records;
pub mod source;

pub use observer::RecordingObserver;
pub use records::{CallBuilder, call};
pub use source::{Gate, ScriptedSource};
