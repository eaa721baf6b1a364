//! Core types for Shopsync.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod cursor;
pub mod id;

pub use cursor::{CursorParseError, SyncCursor};
pub use id::*;
