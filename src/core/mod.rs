//! Core library modules for htail
//!
//! This module contains the internal implementation details of the htail library.

pub mod auth;
pub mod error;
pub mod netrc;
pub mod options;
pub mod output;
pub mod remote;
pub mod scheduler;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export main types for internal use
pub use netrc::Netrc;
pub use scheduler::{open_sources, PollScheduler};
