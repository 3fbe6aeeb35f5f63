//! # AtlasCRM API Server Library
//!
//! HTTP surface of the AtlasCRM credential and entitlement services.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `cookies`: Session cookie building and parsing
//! - `error`: Error handling and HTTP response mapping
//! - `extractors`: Session and admin-tier extractors
//! - `middleware`: Security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod cookies;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod routes;
