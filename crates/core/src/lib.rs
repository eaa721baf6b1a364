//! Shopsync Core - Shared types library.
//!
//! This crate provides common types used across all Shopsync components:
//! - `engine` - The catalog sync engine (API client, reconciliation, orchestrator)
//! - `cli` - Command-line entry points for manual and scheduled sync triggers
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access, no HTTP
//! clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs and the pagination cursor

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
