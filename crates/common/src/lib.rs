//! Common utilities and types shared across the signing authority crates.

#![warn(clippy::pedantic)]

/// Module for flat, case-insensitive configuration sections
pub mod config;

/// Module for secret types that prevent accidental logging
pub mod secret;
