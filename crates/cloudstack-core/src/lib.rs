//! # cloudstack-core
//!
//! Core types and utilities for working with the CloudStack management API.
//!
//! This crate provides foundational identifiers, error handling, configuration and the
//! HTTP transport used by the per-resource CloudStack client crates.
//!
//! ## Modules
//!
//! - [`error`] - Error types and HTTP status code mapping
//! - [`ids`] - Strongly-typed identifier wrappers for CloudStack resources
//! - [`config`] - Configuration structures for CloudStack clients
//! - [`query`] - Command parameter builder
//! - [`client`] - The [`ApiCaller`](client::ApiCaller) seam and its HTTP implementation

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod ids;
pub mod query;

// Re-export commonly used types
pub use client::{execute, ApiCaller, ApiClient, ApiClientBuilder};
pub use error::{Error, Result};
pub use query::{ApiCommand, ApiParams, ApiRequest};
