//! # Sanduq Support
//!
//! Shared helpers for the Sanduq container crates.
//!
//! This crate provides:
//! - Entry-name validation and type-name shortening
//! - "Did you mean?" suggestions for unknown names
//! - Rendering of resolution chains for error messages

pub mod naming;
pub mod rendering;
