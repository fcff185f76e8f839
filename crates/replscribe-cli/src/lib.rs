//! replscribe command-line front end.
//!
//! Split from main.rs so configuration handling and section file I/O can be
//! tested directly.

pub mod config;
pub mod input;
pub mod logging;
