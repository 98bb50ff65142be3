//! Configuration for the nltype pipeline.

mod settings;

pub use settings::*;
