//! Domain models for the gallery web layer.
//!
//! - [`user`] - The signed-in user as held in the browser session
//! - [`session`] - Keys and one-shot notices stored in `tower-sessions`

pub mod session;
pub mod user;

pub use session::keys as session_keys;
pub use session::{Flash, set_flash, take_flash};
pub use user::SessionUser;
