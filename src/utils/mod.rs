//! Generic utility primitives with zero domain knowledge.
//!
//! - `shell` - Shell escaping and quoting
//! - `template` - Multi-line command text collapsing

pub mod shell;
pub mod template;
