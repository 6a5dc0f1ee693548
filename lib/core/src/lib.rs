//! Core identifier types and utilities for tollgate.
//!
//! This crate provides the foundational types shared by the access crates:
//! strongly-typed ULID identifiers and the rootcause-based `Result` alias.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ConstraintId, ParseIdError, SessionId, UserId};
