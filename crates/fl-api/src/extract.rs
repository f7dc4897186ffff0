//! Session and CSRF plumbing shared by the handlers.

use actix_web::cookie::{time::Duration, Cookie, SameSite};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use fl_core::{Actor, AppError};
use futures_util::future::LocalBoxFuture;

use crate::error::ApiError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "session";
pub const CSRF_COOKIE: &str = "csrf";
pub const CAPTCHA_COOKIE: &str = "captcha";
pub const CSRF_HEADER: &str = "x-csrf-token";

/// The authenticated, active account behind the `session` cookie.
/// Extraction fails with 401 for a missing, forged or inactive session.
pub struct CurrentActor(pub Actor);

impl FromRequest for CurrentActor {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = req.cookie(SESSION_COOKIE).map(|c| c.value().to_string());
        Box::pin(async move {
            let state = state.ok_or_else(|| AppError::Internal("application state missing".into()))?;
            let actor = state.services.accounts.session_actor(token.as_deref()).await?;
            Ok(CurrentActor(actor))
        })
    }
}

/// Checks the `x-csrf-token` header, or failing that the submitted form
/// field, against the `csrf` cookie.
pub fn verify_csrf(req: &HttpRequest, state: &AppState, form_token: Option<&str>) -> Result<(), ApiError> {
    let expected = req.cookie(CSRF_COOKIE).map(|c| c.value().to_string()).unwrap_or_default();
    let presented = req
        .headers()
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .or(form_token)
        .unwrap_or_default();
    if !state.auth.verify_csrf(&expected, presented) {
        return Err(AppError::forbidden("invalid csrf token").into());
    }
    Ok(())
}

pub fn http_only_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build(name, value)
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .finish()
}

/// Readable by page scripts so they can echo it in `x-csrf-token`.
pub fn csrf_cookie(value: String, secure: bool) -> Cookie<'static> {
    Cookie::build(CSRF_COOKIE, value)
        .path("/")
        .same_site(SameSite::Strict)
        .secure(secure)
        .finish()
}

pub fn expired_cookie(name: &'static str, secure: bool) -> Cookie<'static> {
    let mut cookie = http_only_cookie(name, String::new(), secure);
    cookie.set_max_age(Duration::ZERO);
    cookie
}

/// Only same-site absolute paths are followed; anything else falls back.
pub fn safe_redirect(target: Option<&str>) -> Option<String> {
    target
        .map(str::trim)
        .filter(|t| t.starts_with('/') && !t.starts_with("//") && !t.contains('\\'))
        .map(str::to_string)
}
