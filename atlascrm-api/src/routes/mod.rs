/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `auth`: Session endpoints (login, register, logout, password reset, code redemption)
/// - `activation`: Activation code issuance (admin PAID codes, public demo requests)
/// - `access`: Resolved access context and tenant scope

pub mod access;
pub mod activation;
pub mod auth;
pub mod health;
