//! Validation utilities
//!
//! Re-reads a written database and checks it survives a write/read cycle

mod roundtrip;

pub use roundtrip::{validate_database, ValidationReport};
