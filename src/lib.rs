//! A vi-style modal command interpreter for embedding in text editors.
//!
//! The interpreter is split along a capability seam: [`handler::ViHandler`]
//! consumes key events, [`grammar`] classifies accumulated keystrokes into
//! commands, and [`exec`] carries them out against any [`textbuf::TextBuffer`]
//! the embedder provides. [`textbuf::RopeBuffer`] is a ropey-backed
//! implementation used by the bundled demo editor and the test suite.

pub mod error;
pub mod exec;
pub mod grammar;
pub mod handler;
pub mod marks;
pub mod mode;
pub mod textbuf;

pub use error::VikeyError;
pub use handler::{StatusSink, ViHandler};
pub use mode::Mode;
