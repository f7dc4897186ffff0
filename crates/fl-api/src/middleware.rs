//! farmlog/crates/fl-api/src/middleware.rs Middleware
//!
//! Request logging, CORS, security headers and CSRF cookie issuance.

use actix_cors::Cors;
use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::middleware::{DefaultHeaders, Logger, Next};
use actix_web::{web, HttpMessage};

use crate::extract::{csrf_cookie, CSRF_COOKIE};
use crate::AppState;

/// remote-ip "request-line" status-code response-size "referrer" "user-agent"
pub fn standard_middleware() -> Logger {
    Logger::default()
}

/// Same-origin only: the dashboard and the API are served together.
pub fn cors_policy() -> Cors {
    Cors::default()
        .allowed_methods(vec!["GET", "POST"])
        .max_age(3600)
}

pub fn security_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add(("X-Content-Type-Options", "nosniff"))
        .add(("X-Frame-Options", "DENY"))
        .add(("Referrer-Policy", "strict-origin-when-cross-origin"))
        .add(("Content-Security-Policy", "default-src 'self'"))
}

/// Gives every visitor a `csrf` cookie. Use with `actix_web::middleware::from_fn`.
pub async fn issue_csrf_cookie(
    req: ServiceRequest,
    next: Next<impl MessageBody>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let fresh = match req.cookie(CSRF_COOKIE) {
        Some(_) => None,
        None => req
            .app_data::<web::Data<AppState>>()
            .map(|state| (state.auth.issue_csrf_token(), state.secure_cookies)),
    };

    let mut res = next.call(req).await?;
    if let Some((token, secure)) = fresh {
        res.response_mut().add_cookie(&csrf_cookie(token, secure))?;
    }
    Ok(res)
}
