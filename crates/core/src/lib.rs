//! Picture Gallery Core - Shared domain types.
//!
//! This crate provides the types used across the gallery components:
//! - `web` - The server-rendered gallery application
//! - `integration-tests` - End-to-end tests against the router
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no HTTP
//! clients, no platform access. Role derivation, category filtering and
//! upload progress math live here so they can be tested in isolation.
//!
//! # Modules
//!
//! - [`types`] - Identifiers, emails, roles, image documents and progress

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
