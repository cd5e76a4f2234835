//! Core types for the picture gallery.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod image;
pub mod progress;
pub mod role;

pub use email::{Email, EmailError};
pub use id::*;
pub use image::{ALL_CATEGORIES, CategoryFilter, ImageDocument};
pub use progress::Progress;
pub use role::{Role, RoleLookup};
