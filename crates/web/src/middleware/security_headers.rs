//! Security headers middleware for XSS, clickjacking, and isolation protection.
//!
//! Gallery images are served by the platform, so the image source list is
//! built from the configured endpoint at startup; everything else stays on
//! `'self'`.

use axum::{
    extract::{Request, State},
    http::{
        HeaderName, HeaderValue,
        header::{
            CACHE_CONTROL, CONTENT_SECURITY_POLICY, REFERRER_POLICY, X_CONTENT_TYPE_OPTIONS,
            X_FRAME_OPTIONS,
        },
    },
    middleware::Next,
    response::Response,
};
use url::Url;

use crate::state::AppState;

/// Build the Content-Security-Policy for a site whose images come from
/// `image_origin`.
///
/// ```text
/// default-src 'none';
/// script-src 'self';
/// style-src 'self';
/// img-src 'self' blob: <platform origin>;
/// connect-src 'self';
/// form-action 'self' <platform origin>;
/// frame-ancestors 'none';
/// ...
/// ```
///
/// `form-action` lists the platform because the OAuth start URL redirects
/// there.
#[must_use]
pub fn content_security_policy(image_origin: &Url) -> String {
    let origin = image_origin.origin().ascii_serialization();
    let upgrade = if image_origin.scheme() == "https" {
        "; upgrade-insecure-requests"
    } else {
        ""
    };
    format!(
        "default-src 'none'; \
         script-src 'self'; \
         style-src 'self'; \
         font-src 'self'; \
         img-src 'self' blob: {origin}; \
         connect-src 'self'; \
         frame-src 'none'; \
         object-src 'none'; \
         base-uri 'self'; \
         form-action 'self' {origin}; \
         frame-ancestors 'none'{upgrade}"
    )
}

/// Add security headers to all responses.
///
/// Headers applied:
/// - `X-Frame-Options: DENY`
/// - `X-Content-Type-Options: nosniff`
/// - `Referrer-Policy: no-referrer`
/// - `Content-Security-Policy` from [`content_security_policy`]
/// - `Permissions-Policy` denying camera, microphone, geolocation and friends
/// - `Cache-Control: no-store, max-age=0` unless the handler set its own
/// - `Cross-Origin-Opener-Policy: same-origin`
/// - `Cross-Origin-Resource-Policy: same-origin`
/// - `Cross-Origin-Embedder-Policy: credentialless` (platform images carry
///   no CORP header)
/// - `X-DNS-Prefetch-Control: off`
pub async fn security_headers_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    headers.insert(X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    headers.insert(REFERRER_POLICY, HeaderValue::from_static("no-referrer"));
    headers.insert(CONTENT_SECURITY_POLICY, state.csp().clone());

    headers.insert(
        HeaderName::from_static("permissions-policy"),
        HeaderValue::from_static(
            "accelerometer=(), \
             autoplay=(), \
             camera=(), \
             display-capture=(), \
             geolocation=(), \
             gyroscope=(), \
             magnetometer=(), \
             microphone=(), \
             payment=(), \
             usb=()",
        ),
    );

    if !headers.contains_key(CACHE_CONTROL) {
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-store, max-age=0"));
    }

    headers.insert(
        HeaderName::from_static("cross-origin-opener-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-resource-policy"),
        HeaderValue::from_static("same-origin"),
    );
    headers.insert(
        HeaderName::from_static("cross-origin-embedder-policy"),
        HeaderValue::from_static("credentialless"),
    );
    headers.insert(
        HeaderName::from_static("x-dns-prefetch-control"),
        HeaderValue::from_static("off"),
    );

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_csp_allows_platform_images() {
        let csp = content_security_policy(&Url::parse("https://cloud.appwrite.io/v1/").unwrap());
        assert!(csp.contains("img-src 'self' blob: https://cloud.appwrite.io;"));
        assert!(csp.contains("form-action 'self' https://cloud.appwrite.io;"));
        assert!(csp.ends_with("upgrade-insecure-requests"));
    }

    #[test]
    fn test_csp_for_local_http() {
        let csp = content_security_policy(&Url::parse("http://127.0.0.1:3000/").unwrap());
        assert!(csp.contains("img-src 'self' blob: http://127.0.0.1:3000;"));
        assert!(!csp.contains("upgrade-insecure-requests"));
        assert!(HeaderValue::from_str(&csp).is_ok());
    }
}
