//! Core domain types
//!
//! These types describe a single preprocessing launch and are shared between
//! the runner (which executes them) and the CLI (which builds them from flags).

pub mod invocation;
pub mod job;
pub mod resources;
