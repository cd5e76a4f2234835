//! Business logic services for the gallery.
//!
//! # Services
//!
//! - `auth` - Authentication state, sessions and role derivation
//! - `gallery` - Image listing and category filtering
//! - `upload` - Admin upload working set, previews and batch submit
//! - `signup` - Signup form validation

pub mod auth;
pub mod gallery;
pub mod signup;
pub mod upload;

pub use auth::{AuthError, AuthManager, AuthRedirect, AuthSettings, AuthState};
pub use gallery::{GalleryError, GalleryImage, GalleryService, GalleryView};
pub use signup::{SignupError, SignupForm};
pub use upload::{DraftStore, IncomingFile, UploadError, UploadForm, UploadService};
