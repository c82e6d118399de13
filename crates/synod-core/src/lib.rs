//! Core types, configuration, and error handling for the Synod gateway.
//!
//! This crate provides the shared foundation used by the other Synod crates:
//! - [`SynodError`] — unified error type using `thiserror`
//! - [`SynodConfig`] — configuration loaded from `.synod.toml` plus env overrides
//! - Shared types: [`Severity`], [`Category`], [`Finding`], [`ReviewRequest`],
//!   [`ReviewResult`], [`ReviewMetadata`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{LlmConfig, ReviewConfig, ServerConfig, SynodConfig};
pub use error::SynodError;
pub use types::{
    Category, Finding, OutputFormat, ReviewContext, ReviewMetadata, ReviewRequest, ReviewResult,
    Severity,
};

/// A convenience `Result` type for Synod operations.
pub type Result<T> = std::result::Result<T, SynodError>;
