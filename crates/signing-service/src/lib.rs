//! Signing Authority Service Library
//!
//! Provisions the RSA signing credential a token-issuing component signs
//! with, and validates bearer tokens for the API hosted in the same process.
//!
//! # Modules
//!
//! - `auth` - Deferred token validation and its collaborators
//! - `config` - Service configuration
//! - `crypto` - Signing credentials and token verification
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `keys` - Development keys, certificate files and certificate stores
//! - `models` - Wire models
//! - `services` - Key provisioning

pub mod auth;
pub mod config;
pub mod crypto;
pub mod errors;
pub mod handlers;
pub mod keys;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod routes;
pub mod services;
