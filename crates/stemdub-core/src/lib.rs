//! stemdub-core: shared types, IDs, errors, cookies and configuration.
//!
//! This crate is the foundational dependency for the other stemdub crates,
//! providing a unified error type, the typed job identifier, the cookie model
//! with its Netscape cookie-jar serialization, and the application
//! configuration types.

pub mod config;
pub mod cookie;
pub mod error;
pub mod ids;

// Re-export the most commonly used items at the crate root.
pub use cookie::Cookie;
pub use error::{Error, Result};
pub use ids::JobId;
