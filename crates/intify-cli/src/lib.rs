//! intify CLI - load records from disk and run the core queries.
//!
//! The `intify` binary parses arguments; the pieces live here so they can be
//! tested without a process boundary.

pub mod commands;
pub mod config;
pub mod input;
