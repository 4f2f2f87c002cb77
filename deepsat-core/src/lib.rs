//! DeepSat Core
//!
//! Core types for the DeepSat preprocessing job launcher.
//!
//! This crate contains:
//! - Domain types: job parameters, resource requests, invocation records
//! - Configuration errors raised while validating them
//! - Shell quoting for rendering command lines as text

pub mod domain;
pub mod error;
pub mod shell;

pub use error::ConfigError;
