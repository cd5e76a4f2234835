//! HTTP middleware stack for the gallery.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, HTTP transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded on the span and Sentry scope)
//! 4. Security headers (CSP, frame, referrer, isolation)
//! 5. Session layer (tower-sessions with in-memory store)
//! 6. Rate limiting (governor, auth form posts only)
//!
//! Authentication is not a layer: handlers opt in through the extractors in
//! [`auth`].

pub mod auth;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{Auth, AuthRejection, CurrentUser, RequireAdmin, RequireUser};
pub use rate_limit::auth_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
