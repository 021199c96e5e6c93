//! Utility functions.
//!
//! Process-level helpers shared by applications embedding the crate.

pub mod bootstrap;
