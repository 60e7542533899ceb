//! CLI subcommand implementations.

pub mod commerce;
pub mod migrate;
pub mod sync;
