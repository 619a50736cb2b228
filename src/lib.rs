// Public API - trace engine, data types and export functions
pub mod config;
pub mod error;
pub mod export;
pub mod probe;
pub mod state;
pub mod trace;

// Command-line surface shared with the binary
pub mod cli;
