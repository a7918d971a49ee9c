//! Common types shared across Scholar crates.
//!
//! This crate provides the error type every component returns and the
//! message shapes passed between the conversation store and model calls.

pub mod error;
pub mod message;
pub mod security;

pub use error::{Result, ScholarError};
pub use message::{InputMessage, MessageRole, window};
pub use security::{validate_file_component, validate_identifier};
