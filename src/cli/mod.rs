//! CLI module for the nltype command-line interface.
//!
//! Command handlers build a pipeline from configuration, run one operation,
//! and print the result as JSON or human-readable text.

mod commands;
mod output;

pub use commands::*;
