//! Command implementations for the CLI
//!
//! - start: Start the server
//! - test: Test configuration validity

pub mod start;
