//! I/O helpers for driver commands.

pub mod config;
pub mod inference;
pub mod lines;
pub mod paths;
pub mod process;
pub mod results;
