//! modelref engine - query boundary
//!
//! This crate implements the caller-facing surface:
//! - Loading a model (and optionally a report) from any catalog source
//! - Answering dependency, impact, usage and unused-object queries
//! - Wrapping every answer in a success-flagged response envelope
//! - Logging setup

pub mod analyzer;
pub mod logging;

pub use analyzer::Analyzer;
