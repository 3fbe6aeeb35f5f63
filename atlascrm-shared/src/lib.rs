//! # AtlasCRM Shared Library
//!
//! The credential and entitlement core of AtlasCRM: accounts, tenants,
//! memberships, sessions, password resets and activation codes.
//!
//! ## Module Organization
//!
//! - `auth`: hashing, tokens, and the credential services
//! - `clock`: injectable time source
//! - `db`: Postgres pool and migrations
//! - `error`: credential error taxonomy
//! - `models`: database models
//! - `store`: transactional persistence behind one trait

pub mod auth;
pub mod clock;
pub mod db;
pub mod error;
pub mod models;
pub mod store;

/// Current version of the AtlasCRM shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
