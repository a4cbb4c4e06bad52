//! CLI-specific utilities for htail
//!
//! Argument grammars and checks used by the command-line interface,
//! kept apart from the core library.

pub mod offset;
pub mod validate;

pub use offset::{parse_offset, StartOffset};
pub use validate::{existing_dir, existing_file, parse_seconds};
