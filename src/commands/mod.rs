//! Command-line interface definitions and handlers for the mrepack CLI.

pub mod args;
pub mod inspect;
pub mod repack;

pub use args::{Cli, Commands};
pub use inspect::run_inspect;
pub use repack::run_repack;
